//! Playback-state watcher.
//!
//! Samples the player's transport state on a background thread and forwards
//! a [`PlayerState`] event whenever it changes, the same signal the player
//! broadcasts as "playback state changed". A closed player counts as
//! `Stopped` and is never sent an automation command.

use crate::probe::PlayerProbe;
use crate::track::PlayerState;
use crossbeam_channel::Sender;
use log::{debug, info};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Changed(PlayerState),
    Unchanged,
    /// The player answered with something that is not a state.
    Unreadable,
}

pub struct PlaybackWatcher {
    probe: PlayerProbe,
    last: Option<PlayerState>,
}

impl PlaybackWatcher {
    pub fn new(probe: PlayerProbe) -> Self {
        Self { probe, last: None }
    }

    /// Take one sample. The first readable sample always counts as a change.
    pub fn observe(&mut self) -> WatchOutcome {
        let current = if self.probe.is_player_running() {
            match self.probe.player_state() {
                Some(state) => state,
                None => return WatchOutcome::Unreadable,
            }
        } else {
            PlayerState::Stopped
        };

        if self.last == Some(current) {
            WatchOutcome::Unchanged
        } else {
            self.last = Some(current);
            WatchOutcome::Changed(current)
        }
    }

    /// Run a watcher on its own thread until `stop` is set or `events` is
    /// disconnected.
    ///
    /// The probe is built on the watcher thread, so its parts need not be `Send`.
    pub fn spawn<F, E>(
        make_probe: F,
        interval: Duration,
        events: Sender<E>,
        stop: Arc<AtomicBool>,
    ) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce() -> PlayerProbe + Send + 'static,
        E: From<PlayerState> + Send + 'static,
    {
        thread::Builder::new()
            .name("playback-watcher".to_string())
            .spawn(move || {
                let mut watcher = PlaybackWatcher::new(make_probe());
                info!("Watching {} every {interval:?}", watcher.probe.player_name());
                while !stop.load(Ordering::SeqCst) {
                    if let WatchOutcome::Changed(state) = watcher.observe() {
                        debug!("Player is now {state}");
                        if events.send(E::from(state)).is_err() {
                            break;
                        }
                    }
                    thread::sleep(interval);
                }
                debug!("Playback watcher exiting");
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakePlayer;

    #[test]
    fn test_first_sample_is_reported() {
        let player = FakePlayer::new();
        player.set_player_state("playing");
        let mut watcher = PlaybackWatcher::new(player.probe());

        assert_eq!(watcher.observe(), WatchOutcome::Changed(PlayerState::Playing));
        assert_eq!(watcher.observe(), WatchOutcome::Unchanged);
    }

    #[test]
    fn test_reports_each_transition() {
        let player = FakePlayer::new();
        let mut watcher = PlaybackWatcher::new(player.probe());

        player.set_player_state("playing");
        watcher.observe();
        player.set_player_state("paused");
        assert_eq!(watcher.observe(), WatchOutcome::Changed(PlayerState::Paused));
        player.set_player_state("playing");
        assert_eq!(watcher.observe(), WatchOutcome::Changed(PlayerState::Playing));
    }

    #[test]
    fn test_closed_player_is_stopped_without_automation() {
        let player = FakePlayer::new();
        player.set_running(false);
        let mut watcher = PlaybackWatcher::new(player.probe());

        assert_eq!(watcher.observe(), WatchOutcome::Changed(PlayerState::Stopped));
        assert!(player.commands().is_empty());
    }

    #[test]
    fn test_unreadable_state_keeps_last() {
        let player = FakePlayer::new();
        let mut watcher = PlaybackWatcher::new(player.probe());

        player.set_player_state("playing");
        watcher.observe();
        player.fail_scripts(true);
        assert_eq!(watcher.observe(), WatchOutcome::Unreadable);

        player.fail_scripts(false);
        assert_eq!(watcher.observe(), WatchOutcome::Unchanged);
    }

    struct AlwaysPlaying;

    impl crate::gateway::ScriptGateway for AlwaysPlaying {
        fn execute(&self, _script: &str) -> Result<String, crate::gateway::GatewayError> {
            Ok("playing\n".to_string())
        }
    }

    impl crate::probe::ProcessLookup for AlwaysPlaying {
        fn is_running(&self, _name: &str) -> bool {
            true
        }
    }

    #[test]
    fn test_spawned_watcher_sends_and_stops() {
        let (tx, rx) = crossbeam_channel::unbounded::<PlayerState>();
        let stop = Arc::new(AtomicBool::new(false));
        let handle = PlaybackWatcher::spawn(
            || PlayerProbe::new(Box::new(AlwaysPlaying), Box::new(AlwaysPlaying), "Spotify"),
            Duration::from_millis(5),
            tx,
            Arc::clone(&stop),
        )
        .unwrap();

        let first = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(first, PlayerState::Playing);
        // Steady state produces no further events.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        stop.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }
}
