//! # Ad Detection State Machine
//!
//! Decides from playback events and periodic checks whether the player is on
//! an ad, and mutes or restores it accordingly.
//!
//! ## Inputs
//!
//! - Playback-state events ([`AdDetector::handle_playback_event`]): `Paused`
//!   and `Stopped` end monitoring, `Playing` triggers an immediate check.
//! - Timers ([`AdDetector::run_due_timers`]): the recurring poll, the optional
//!   look-ahead check at the expected end of a track, and the settle-delay
//!   volume restore. The player fires no event on ad/track boundaries within
//!   one playing session, so only polling sees those.
//!
//! ## Check routine
//!
//! 1. Player not running: go `Inactive`, no automation calls.
//! 2. Coming from `Inactive`: publish `Active` provisionally.
//! 3. `Track`: unmute and maybe schedule a look-ahead check.
//! 4. `Advertisement` or `Unknown`: mute. Silence on uncertainty costs at most
//!    one poll interval of a real track.
//!
//! Every check recomputes the truth from fresh probe reads, so repeated,
//! stale or reordered triggers converge within one cycle.
//!
//! Everything runs on the agent thread. Time is passed in explicitly so the
//! machine can be driven deterministically.

use crate::config::{ConfigProvider, Settings};
use crate::notifier::{NotificationEmitter, Notifier};
use crate::probe::PlayerProbe;
use crate::timer::PollTimer;
use crate::track::{PlayerState, TrackKind};
use crate::volume::{VolumeController, VolumeSnapshot};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// What the agent is doing, as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// A real track is audible.
    Active,
    /// An ad is being suppressed.
    Muting,
    /// Player closed, paused or stopped.
    Inactive,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Active => write!(f, "active"),
            PlaybackState::Muting => write!(f, "muting ad"),
            PlaybackState::Inactive => write!(f, "inactive"),
        }
    }
}

/// Receives every change of [`PlaybackState`], once per change.
pub trait StateObserver {
    fn state_changed(&mut self, state: PlaybackState);
}

pub struct AdDetector {
    probe: PlayerProbe,
    volume: VolumeController,
    config: Box<dyn ConfigProvider>,
    observer: Box<dyn StateObserver>,
    notifications: NotificationEmitter,
    state: PlaybackState,
    poll: PollTimer,
    lookahead: Option<Instant>,
    /// Track the look-ahead was last scheduled for
    lookahead_track: Option<String>,
    /// Ad that the held volume snapshot was taken for
    muted_item: Option<String>,
}

impl AdDetector {
    pub fn new(
        probe: PlayerProbe,
        config: Box<dyn ConfigProvider>,
        observer: Box<dyn StateObserver>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            probe,
            volume: VolumeController::new(),
            config,
            observer,
            notifications: NotificationEmitter::new(notifier),
            state: PlaybackState::Inactive,
            poll: PollTimer::new(),
            lookahead: None,
            lookahead_track: None,
            muted_item: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn volume_snapshot(&self) -> VolumeSnapshot {
        self.volume.snapshot()
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_running()
    }

    pub fn lookahead_deadline(&self) -> Option<Instant> {
        self.lookahead
    }

    /// React to a playback-state-changed event.
    pub fn handle_playback_event(&mut self, event: PlayerState, now: Instant) {
        debug!("Playback event: {event}");
        match event {
            PlayerState::Paused | PlayerState::Stopped => self.go_inactive(),
            PlayerState::Playing => {
                let settings = self.config.settings();
                if self.state == PlaybackState::Inactive
                    && settings.restart_track_on_resume
                    && self.probe.is_player_running()
                {
                    info!("Restarting track on resume");
                    self.probe.previous_track();
                }
                self.check_with(&settings, now);
            }
        }
    }

    /// Classify the current item and converge volume and state on it.
    pub fn check(&mut self, now: Instant) {
        let settings = self.config.settings();
        self.check_with(&settings, now);
    }

    fn check_with(&mut self, settings: &Settings, now: Instant) {
        if !self.probe.is_player_running() {
            debug!("{} is not running", self.probe.player_name());
            self.go_inactive();
            return;
        }

        if self.state == PlaybackState::Inactive {
            self.set_state(PlaybackState::Active);
        }
        self.poll.start(now, settings.poll_interval());

        let track = self.probe.current_track_reference();
        debug!("Current item {:?} classified as {}", track.id, track.kind);

        match track.kind {
            TrackKind::Track => {
                self.unmute(now);
                if settings.lookahead_checks {
                    self.schedule_lookahead(&track.id, now);
                }
            }
            TrackKind::Advertisement | TrackKind::Unknown => {
                self.lookahead_track = None;
                self.mute(&track.id, settings);
            }
        }
    }

    /// Silence the player for an ad. No-op while already muting.
    ///
    /// Resuming on the ad that is already held silent only republishes
    /// `Muting`; the player is still at zero.
    fn mute(&mut self, item: &str, settings: &Settings) {
        if self.state == PlaybackState::Muting {
            return;
        }
        if self.volume.is_muted() && self.muted_item.as_deref() == Some(item) {
            debug!("Still holding {item:?} muted");
            self.set_state(PlaybackState::Muting);
            return;
        }

        self.volume.mute(&mut self.probe, settings.pause_bounce_on_mute);
        self.muted_item = Some(item.to_string());
        self.set_state(PlaybackState::Muting);

        if settings.notifications_enabled {
            let duration = self.probe.current_track_duration_seconds();
            self.notifications.ad_muted(true, duration);
        }
    }

    /// Publish `Active` now and restore the volume after the settle delay.
    fn unmute(&mut self, now: Instant) {
        if self.state == PlaybackState::Active && !self.volume.is_muted() {
            return;
        }
        self.muted_item = None;
        self.set_state(PlaybackState::Active);
        if self.volume.schedule_restore(now) {
            debug!("Volume restore scheduled");
        }
    }

    /// Schedule a check at the expected end of `track`, once per track.
    fn schedule_lookahead(&mut self, track: &str, now: Instant) {
        if self.lookahead_track.as_deref() == Some(track) {
            return;
        }
        self.lookahead_track = Some(track.to_string());
        self.lookahead = None;

        let duration = self.probe.current_track_duration_seconds();
        if duration > 0.0 {
            let at = now + Duration::from_secs_f64(duration);
            debug!("Look-ahead check in {duration:.1}s");
            self.lookahead = Some(at);
        }
    }

    fn go_inactive(&mut self) {
        if self.poll.stop() {
            debug!("Polling stopped");
        }
        self.lookahead = None;
        self.lookahead_track = None;
        self.set_state(PlaybackState::Inactive);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state == state {
            return;
        }
        info!("State: {} -> {}", self.state, state);
        self.state = state;
        self.observer.state_changed(state);
    }

    /// Earliest instant at which [`run_due_timers`](Self::run_due_timers) has work.
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.poll.deadline(),
            self.lookahead,
            self.volume.restore_deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// Fire every timer whose deadline has passed.
    pub fn run_due_timers(&mut self, now: Instant) {
        self.volume.restore_if_due(&mut self.probe, now);

        let settings = self.config.settings();
        let mut due = self.poll.fire_if_due(now, settings.poll_interval());
        if self.lookahead.is_some_and(|at| at <= now) {
            debug!("Look-ahead check due");
            self.lookahead = None;
            due = true;
        }

        if due {
            self.check_with(&settings, now);
        }
    }

    /// Stop monitoring and give the user their volume back.
    pub fn shutdown(&mut self) {
        self.poll.stop();
        self.lookahead = None;
        if self.volume.is_muted() {
            self.volume.restore_now(&mut self.probe);
        }
        self.set_state(PlaybackState::Inactive);
    }
}
