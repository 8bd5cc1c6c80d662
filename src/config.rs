//! # Configuration Module
//!
//! User settings and data directory management for Spotimute.
//!
//! ## Settings
//!
//! Settings live in a JSON file in the platform configuration directory:
//! - Linux: `~/.config/spotimute/settings.json`
//! - macOS: `~/Library/Application Support/spotimute/settings.json`
//!
//! The detector never caches them. [`SettingsFile`] re-reads the file on every
//! use, so `spotimute config set ...` takes effect on the next check of a
//! running agent.
//!
//! ## Data Storage
//!
//! Runtime files (`spotimute.pid`, `status.json`) live in the platform data
//! directory under `spotimute/`.

use anyhow::{anyhow, bail, Context, Result};
use log::warn;
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const APP_DIR: &str = "spotimute";
const SETTINGS_FILE: &str = "settings.json";

/// Default poll interval in seconds
pub const DEFAULT_POLL_INTERVAL: f64 = 0.3;
/// Shortest poll interval accepted
pub const MIN_POLL_INTERVAL: f64 = 0.05;
/// Default playback watcher interval in seconds
pub const DEFAULT_WATCH_INTERVAL: f64 = 1.0;
/// Default automation timeout in seconds
pub const DEFAULT_SCRIPT_TIMEOUT: f64 = 5.0;

/// User-tunable behaviour of the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between checks while the player is active
    pub poll_interval_seconds: f64,
    /// Show a desktop notification when an ad gets muted
    pub notifications_enabled: bool,
    /// Application and process name of the player
    pub player_name: String,
    /// Seconds between playback-state samples
    pub watch_interval_seconds: f64,
    /// Kill automation calls that take longer than this (0 = never)
    pub script_timeout_seconds: f64,
    /// Pause and resume after muting so ads that bypass the volume go quiet
    pub pause_bounce_on_mute: bool,
    /// Schedule an extra check when the current track should end
    pub lookahead_checks: bool,
    /// Restart the current track when playback resumes
    pub restart_track_on_resume: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_seconds: DEFAULT_POLL_INTERVAL,
            notifications_enabled: false,
            player_name: "Spotify".to_string(),
            watch_interval_seconds: DEFAULT_WATCH_INTERVAL,
            script_timeout_seconds: DEFAULT_SCRIPT_TIMEOUT,
            pause_bounce_on_mute: true,
            lookahead_checks: true,
            restart_track_on_resume: false,
        }
    }
}

/// Keys accepted by [`Settings::set`]
pub const SETTING_KEYS: &[&str] = &[
    "poll-interval-seconds",
    "notifications-enabled",
    "player-name",
    "watch-interval-seconds",
    "script-timeout-seconds",
    "pause-bounce-on-mute",
    "lookahead-checks",
    "restart-track-on-resume",
];

impl Settings {
    /// Poll interval, falling back to the default for unusable values
    pub fn poll_interval(&self) -> Duration {
        seconds_or(self.poll_interval_seconds, DEFAULT_POLL_INTERVAL)
    }

    pub fn watch_interval(&self) -> Duration {
        seconds_or(self.watch_interval_seconds, DEFAULT_WATCH_INTERVAL)
    }

    /// `None` when the timeout is disabled
    pub fn script_timeout(&self) -> Option<Duration> {
        let secs = self.script_timeout_seconds;
        if secs == 0.0 {
            None
        } else {
            Some(seconds_or(secs, DEFAULT_SCRIPT_TIMEOUT))
        }
    }

    /// Update one setting from its command-line spelling.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let key = key.replace('_', "-");
        match key.as_str() {
            "poll-interval-seconds" => self.poll_interval_seconds = parse_seconds(value)?,
            "notifications-enabled" => self.notifications_enabled = parse_bool(value)?,
            "player-name" => {
                if value.trim().is_empty() {
                    bail!("player-name cannot be empty");
                }
                self.player_name = value.trim().to_string();
            }
            "watch-interval-seconds" => self.watch_interval_seconds = parse_seconds(value)?,
            "script-timeout-seconds" => {
                let secs: f64 = value
                    .parse()
                    .with_context(|| format!("'{value}' is not a number"))?;
                if !secs.is_finite() || secs < 0.0 {
                    bail!("timeout must be zero or a positive number of seconds");
                }
                self.script_timeout_seconds = secs;
            }
            "pause-bounce-on-mute" => self.pause_bounce_on_mute = parse_bool(value)?,
            "lookahead-checks" => self.lookahead_checks = parse_bool(value)?,
            "restart-track-on-resume" => self.restart_track_on_resume = parse_bool(value)?,
            other => bail!(
                "Unknown setting '{other}'. Valid keys: {}",
                SETTING_KEYS.join(", ")
            ),
        }
        Ok(())
    }
}

fn seconds_or(secs: f64, fallback: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs.max(MIN_POLL_INTERVAL))
    } else {
        warn!("Ignoring invalid interval {secs}, using {fallback}s");
        Duration::from_secs_f64(fallback)
    }
}

fn parse_seconds(value: &str) -> Result<f64> {
    let secs: f64 = value
        .parse()
        .with_context(|| format!("'{value}' is not a number"))?;
    if !secs.is_finite() || secs <= 0.0 {
        bail!("interval must be a positive number of seconds");
    }
    Ok(secs)
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => bail!("'{value}' is not a boolean (use on/off)"),
    }
}

/// Source of the current settings, consulted on every decision.
pub trait ConfigProvider {
    fn settings(&self) -> Settings;
}

impl ConfigProvider for Settings {
    fn settings(&self) -> Settings {
        self.clone()
    }
}

/// Settings persisted as JSON, re-read on every access.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Settings file at `path`, or the platform default when `None`
    pub fn locate(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let absolute = path
                    .absolutize()
                    .with_context(|| format!("Invalid settings path {}", path.display()))?;
                Ok(Self::new(absolute.into_owned()))
            }
            None => Ok(Self::new(get_config_dir()?.join(SETTINGS_FILE))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing file yields the defaults.
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read settings from {}", self.path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings file {}", self.path.display()))
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let text = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, text)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    /// Load, apply `change`, save, and return the new settings.
    pub fn update(&self, change: impl FnOnce(&mut Settings) -> Result<()>) -> Result<Settings> {
        let mut settings = self.load()?;
        change(&mut settings)?;
        self.save(&settings)?;
        Ok(settings)
    }
}

impl ConfigProvider for SettingsFile {
    fn settings(&self) -> Settings {
        self.load().unwrap_or_else(|e| {
            warn!("{e:#}; using default settings");
            Settings::default()
        })
    }
}

fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf> {
    let base = base.ok_or_else(|| {
        anyhow!(
            "Could not determine system {kind} directory. Please ensure your platform supports standard {kind} directories."
        )
    })?;

    let dir = base.join(APP_DIR);
    fs::create_dir_all(&dir).with_context(|| {
        format!(
            "Failed to create Spotimute {kind} directory at {}. Please check file permissions.",
            dir.display()
        )
    })?;
    Ok(dir)
}

/// Returns the platform-appropriate data directory, creating it if needed.
///
/// Holds the daemon PID file and the last published state.
pub fn get_data_dir() -> Result<PathBuf> {
    app_dir(dirs::data_dir(), "data")
}

/// Returns the platform-appropriate configuration directory, creating it if needed.
pub fn get_config_dir() -> Result<PathBuf> {
    app_dir(dirs::config_dir(), "config")
}
