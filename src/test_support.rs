//! In-memory doubles for the player, notifications and state observers.

use crate::config::{ConfigProvider, Settings};
use crate::detector::{PlaybackState, StateObserver};
use crate::gateway::{GatewayError, ScriptGateway};
use crate::notifier::Notifier;
use crate::probe::{PlayerProbe, ProcessLookup};
use std::cell::RefCell;
use std::rc::Rc;

const PREFIX: &str = "tell application \"Spotify\" to ";
const BOUNCE: &str = "tell application \"Spotify\"\n    pause\n    play\nend tell";

#[derive(Debug)]
struct PlayerModel {
    url: String,
    duration: String,
    volume: u8,
    state: String,
    running: bool,
    failing: bool,
    bounces: usize,
    commands: Vec<String>,
}

/// Scriptable stand-in for the Spotify application.
#[derive(Debug, Clone)]
pub struct FakePlayer {
    model: Rc<RefCell<PlayerModel>>,
}

impl FakePlayer {
    pub fn new() -> Self {
        Self {
            model: Rc::new(RefCell::new(PlayerModel {
                url: String::new(),
                duration: "0".to_string(),
                volume: 80,
                state: "playing".to_string(),
                running: true,
                failing: false,
                bounces: 0,
                commands: Vec::new(),
            })),
        }
    }

    pub fn probe(&self) -> PlayerProbe {
        PlayerProbe::new(Box::new(self.clone()), Box::new(self.clone()), "Spotify")
    }

    pub fn set_track(&self, url: &str, duration_ms: u64) {
        let mut model = self.model.borrow_mut();
        model.url = url.to_string();
        model.duration = duration_ms.to_string();
    }

    pub fn set_raw_duration(&self, raw: &str) {
        self.model.borrow_mut().duration = raw.to_string();
    }

    pub fn set_volume(&self, volume: u8) {
        self.model.borrow_mut().volume = volume;
    }

    pub fn volume(&self) -> u8 {
        self.model.borrow().volume
    }

    pub fn set_player_state(&self, state: &str) {
        self.model.borrow_mut().state = state.to_string();
    }

    pub fn set_running(&self, running: bool) {
        self.model.borrow_mut().running = running;
    }

    pub fn fail_scripts(&self, failing: bool) {
        self.model.borrow_mut().failing = failing;
    }

    /// Pause-then-play round trips the player went through
    pub fn bounces(&self) -> usize {
        self.model.borrow().bounces
    }

    pub fn commands(&self) -> Vec<String> {
        self.model.borrow().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.model.borrow_mut().commands.clear();
    }

    pub fn count(&self, suffix: &str) -> usize {
        self.model
            .borrow()
            .commands
            .iter()
            .filter(|c| c.ends_with(suffix))
            .count()
    }
}

impl ScriptGateway for FakePlayer {
    fn execute(&self, script: &str) -> Result<String, GatewayError> {
        let mut model = self.model.borrow_mut();
        model.commands.push(script.to_string());

        let failure = || GatewayError::NonZeroExit {
            status: "exit status: 1".to_string(),
            stderr: "execution error".to_string(),
        };
        if model.failing {
            return Err(failure());
        }

        if script == BOUNCE {
            model.bounces += 1;
            model.state = "playing".to_string();
            return Ok("\n".to_string());
        }

        let body = script.strip_prefix(PREFIX).ok_or_else(failure)?;
        let output = match body {
            "(get spotify url of current track)" => model.url.clone(),
            "(get duration of current track)" => model.duration.clone(),
            "(get sound volume)" => model.volume.to_string(),
            "(get player state)" => model.state.clone(),
            "(play previous track)" => String::new(),
            other => {
                let volume = other
                    .strip_prefix("set sound volume to ")
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(failure)?;
                model.volume = volume;
                String::new()
            }
        };
        Ok(format!("{output}\n"))
    }
}

impl ProcessLookup for FakePlayer {
    fn is_running(&self, _name: &str) -> bool {
        self.model.borrow().running
    }
}

/// Records every published state.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    pub states: Rc<RefCell<Vec<PlaybackState>>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<PlaybackState> {
        self.states.borrow().clone()
    }
}

impl StateObserver for RecordingObserver {
    fn state_changed(&mut self, state: PlaybackState) {
        self.states.borrow_mut().push(state);
    }
}

/// Records every notification request.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    pub sent: Rc<RefCell<Vec<(String, String)>>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.borrow().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn request_notification(&self, title: &str, body: &str) {
        self.sent
            .borrow_mut()
            .push((title.to_string(), body.to_string()));
    }
}

/// Settings that tests can change between checks.
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    pub settings: Rc<RefCell<Settings>>,
}

impl SharedSettings {
    pub fn update(&self, change: impl FnOnce(&mut Settings)) {
        change(&mut self.settings.borrow_mut());
    }
}

impl ConfigProvider for SharedSettings {
    fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }
}
