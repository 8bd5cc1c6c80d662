//! # Player State Probe
//!
//! Semantic queries and commands on top of the [`ScriptGateway`]: current
//! track, duration, volume, transport state, and whether the player process
//! is alive at all.
//!
//! ## Error Handling Strategy
//!
//! Nothing in here fails loudly. A broken automation call degrades to a safe
//! default (unknown track, zero duration, last known volume) and is logged,
//! because the next poll will re-observe the truth anyway.

use crate::gateway::{GatewayError, ScriptGateway};
use crate::track::{self, PlayerState, TrackReference};
use log::{debug, warn};
use std::cell::{Cell, RefCell};
use std::ffi::OsStr;
use sysinfo::{Pid, ProcessesToUpdate, System};
use thiserror::Error;

/// Volume assumed before the player has ever answered a volume query
pub const INITIAL_VOLUME: u8 = 100;

/// Why a probe query produced no usable value.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The player answered, but the answer means nothing.
    #[error("ambiguous answer to '{command}': {output:?}")]
    AmbiguousRead { command: String, output: String },
}

/// Answers "is the named process running".
pub trait ProcessLookup {
    fn is_running(&self, name: &str) -> bool;
}

/// Process lookup backed by the OS process table.
///
/// Keeps one process table and remembers the player's PID, so a check while
/// the player runs refreshes a single process. The full table is only
/// rescanned when that PID is gone.
pub struct SysinfoLookup {
    system: RefCell<System>,
    player_pid: Cell<Option<Pid>>,
}

impl Default for SysinfoLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoLookup {
    pub fn new() -> Self {
        Self {
            system: RefCell::new(System::new()),
            player_pid: Cell::new(None),
        }
    }
}

impl ProcessLookup for SysinfoLookup {
    fn is_running(&self, name: &str) -> bool {
        let name = OsStr::new(name);
        let mut sys = self.system.borrow_mut();

        if let Some(pid) = self.player_pid.get() {
            sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            if sys.process(pid).is_some_and(|process| process.name() == name) {
                return true;
            }
        }

        sys.refresh_processes(ProcessesToUpdate::All, true);
        let found = sys
            .processes()
            .iter()
            .find(|(_, process)| process.name() == name)
            .map(|(pid, _)| *pid);
        self.player_pid.set(found);
        found.is_some()
    }
}

/// Automation commands understood by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerCommand {
    TrackUrl,
    TrackDuration,
    SoundVolume,
    SetSoundVolume(u8),
    PlayerState,
    PauseThenPlay,
    PreviousTrack,
}

impl PlayerCommand {
    /// The AppleScript statement sent to the application
    pub fn script(&self, player: &str) -> String {
        let body = match self {
            PlayerCommand::TrackUrl => "(get spotify url of current track)".to_string(),
            PlayerCommand::TrackDuration => "(get duration of current track)".to_string(),
            PlayerCommand::SoundVolume => "(get sound volume)".to_string(),
            PlayerCommand::SetSoundVolume(volume) => format!("set sound volume to {volume}"),
            PlayerCommand::PlayerState => "(get player state)".to_string(),
            // A single script, so no other caller sees the player paused.
            PlayerCommand::PauseThenPlay => {
                return format!("tell application \"{player}\"\n    pause\n    play\nend tell");
            }
            PlayerCommand::PreviousTrack => "(play previous track)".to_string(),
        };
        format!("tell application \"{player}\" to {body}")
    }
}

/// Typed access to the external player.
pub struct PlayerProbe {
    gateway: Box<dyn ScriptGateway>,
    processes: Box<dyn ProcessLookup>,
    player: String,
    last_volume: u8,
}

impl PlayerProbe {
    pub fn new(
        gateway: Box<dyn ScriptGateway>,
        processes: Box<dyn ProcessLookup>,
        player: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            processes,
            player: player.into(),
            last_volume: INITIAL_VOLUME,
        }
    }

    pub fn player_name(&self) -> &str {
        &self.player
    }

    /// Whether the player process exists. Never issues an automation call.
    pub fn is_player_running(&self) -> bool {
        self.processes.is_running(&self.player)
    }

    /// Current track, `Unknown` when the player gives no usable answer
    pub fn current_track_reference(&self) -> TrackReference {
        match self.read(PlayerCommand::TrackUrl) {
            Ok(raw) => TrackReference::classify(&raw),
            Err(e) => {
                debug!("Track URL unavailable: {e}");
                TrackReference::unknown()
            }
        }
    }

    /// Current track duration in seconds, `0.0` when unknown
    pub fn current_track_duration_seconds(&self) -> f64 {
        let parsed = self
            .read(PlayerCommand::TrackDuration)
            .and_then(|raw| {
                track::parse_duration_seconds(&raw).ok_or_else(|| ProbeError::AmbiguousRead {
                    command: "duration".to_string(),
                    output: raw,
                })
            });

        match parsed {
            Ok(seconds) => seconds,
            Err(e) => {
                debug!("Track duration unavailable: {e}");
                0.0
            }
        }
    }

    /// Current sound volume; falls back to the last value seen
    pub fn current_volume(&mut self) -> u8 {
        let parsed = self.read(PlayerCommand::SoundVolume).and_then(|raw| {
            track::parse_volume(&raw).ok_or_else(|| ProbeError::AmbiguousRead {
                command: "sound volume".to_string(),
                output: raw,
            })
        });

        match parsed {
            Ok(volume) => {
                self.last_volume = volume;
                volume
            }
            Err(e) => {
                let fallback = self.last_volume;
                warn!("Could not read volume ({e}), assuming {fallback}");
                fallback
            }
        }
    }

    /// Transport state, `None` when the answer is unusable
    pub fn player_state(&self) -> Option<PlayerState> {
        match self.read(PlayerCommand::PlayerState) {
            Ok(raw) => match raw.parse() {
                Ok(state) => Some(state),
                Err(e) => {
                    debug!("Ignoring player state: {e}");
                    None
                }
            },
            Err(e) => {
                debug!("Player state unavailable: {e}");
                None
            }
        }
    }

    pub fn set_volume(&mut self, volume: u8) {
        let volume = volume.min(100);
        // Zero is our own mute, not a level worth falling back to.
        if self.send(PlayerCommand::SetSoundVolume(volume)) && volume > 0 {
            self.last_volume = volume;
        }
    }

    /// Bounce playback so the player re-applies a volume change.
    pub fn pause_then_resume(&self) {
        self.send(PlayerCommand::PauseThenPlay);
    }

    /// Restart the current track (or go back one, near its start).
    pub fn previous_track(&self) {
        self.send(PlayerCommand::PreviousTrack);
    }

    fn read(&self, command: PlayerCommand) -> Result<String, ProbeError> {
        let script = command.script(&self.player);
        let output = self.gateway.execute(&script)?;
        let trimmed = output.trim();
        if trimmed.is_empty() || trimmed == "missing value" {
            return Err(ProbeError::AmbiguousRead {
                command: script,
                output,
            });
        }
        Ok(trimmed.to_string())
    }

    fn send(&self, command: PlayerCommand) -> bool {
        match self.gateway.execute(&command.script(&self.player)) {
            Ok(_) => true,
            Err(e) => {
                warn!("Player command {command:?} failed: {e}");
                false
            }
        }
    }
}
