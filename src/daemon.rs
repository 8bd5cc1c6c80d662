//! # Ad Muting Agent
//!
//! Background process that keeps the player's volume in line with what it is
//! playing.
//!
//! ## Architecture
//!
//! ```text
//! playback-watcher thread ──PlayerState──▶ channel ──▶ agent loop ──▶ AdDetector
//!                                                         │
//!                                         timers (poll, look-ahead, restore)
//! ```
//!
//! All detector state lives on the agent loop thread. The loop sleeps until
//! either an event arrives or the detector's next timer is due, and wakes at
//! least every [`MAX_IDLE`] to notice a shutdown request. Both threads share
//! one serialized gateway, so only one automation call runs at a time.
//!
//! ## Implementation
//!
//! The agent runs as a separate process started and stopped via CLI commands.
//! It writes a PID file for management and a status file with the last
//! published state.

use crate::config::{self, ConfigProvider, SettingsFile};
use crate::detector::{AdDetector, PlaybackState, StateObserver};
use crate::gateway::{CommandGateway, SerializedGateway};
use crate::notifier::DesktopNotifier;
use crate::probe::{PlayerProbe, SysinfoLookup};
use crate::track::PlayerState;
use crate::watcher::PlaybackWatcher;
use anyhow::{bail, Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Longest the loop sleeps without checking for shutdown
pub const MAX_IDLE: Duration = Duration::from_millis(250);

const PID_FILE: &str = "spotimute.pid";
const STATUS_FILE: &str = "status.json";

static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn request_shutdown(_signal: libc::c_int) {
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
}

/// Route SIGINT and SIGTERM to a clean shutdown of the agent loop.
fn install_signal_handlers() {
    // SAFETY: the handler only stores to an atomic, which is async-signal-safe.
    unsafe {
        libc::signal(libc::SIGTERM, request_shutdown as libc::sighandler_t);
        libc::signal(libc::SIGINT, request_shutdown as libc::sighandler_t);
    }
}

/// Input of the agent loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEvent {
    Playback(PlayerState),
    Shutdown,
}

impl From<PlayerState> for AgentEvent {
    fn from(state: PlayerState) -> Self {
        AgentEvent::Playback(state)
    }
}

/// Last published state, as stored in the status file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub state: PlaybackState,
    /// Seconds since the Unix epoch
    pub updated_at: u64,
    pub pid: u32,
}

/// Observer that logs state changes and mirrors them into a status file.
#[derive(Debug, Clone)]
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn publish(&self, state: PlaybackState) -> Result<()> {
        let updated_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let record = StatusRecord {
            state,
            updated_at,
            pid: std::process::id(),
        };
        let text = serde_json::to_string(&record)?;
        fs::write(&self.path, text)
            .with_context(|| format!("Failed to write status to {}", self.path.display()))
    }

    /// Read the last record; `None` if the agent never ran.
    pub fn read(&self) -> Result<Option<StatusRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&self.path)?;
        let record = serde_json::from_str(&text)
            .with_context(|| format!("Corrupt status file {}", self.path.display()))?;
        Ok(Some(record))
    }
}

impl StateObserver for StatusFile {
    fn state_changed(&mut self, state: PlaybackState) {
        info!("Spotimute is {state}");
        if let Err(e) = self.publish(state) {
            warn!("{e:#}");
        }
    }
}

/// The long-running ad muting agent
#[derive(Debug)]
pub struct Agent {
    settings: SettingsFile,
    pid_file: PathBuf,
    status: StatusFile,
}

impl Agent {
    /// Create an agent that keeps its runtime files in the data directory
    pub fn new(settings: SettingsFile) -> Result<Self> {
        let data_dir = config::get_data_dir()?;
        Ok(Self {
            settings,
            pid_file: data_dir.join(PID_FILE),
            status: StatusFile::new(data_dir.join(STATUS_FILE)),
        })
    }

    /// Run until SIGINT/SIGTERM.
    pub fn start_monitoring(&mut self) -> Result<()> {
        info!("Starting ad muting agent");

        let pid = std::process::id();
        fs::write(&self.pid_file, pid.to_string())
            .with_context(|| format!("Failed to write PID file {}", self.pid_file.display()))?;
        info!("Agent started with PID {pid}");

        install_signal_handlers();
        if let Err(e) = self.status.publish(PlaybackState::Inactive) {
            warn!("{e:#}");
        }

        let result = self.monitor();

        let _ = fs::remove_file(&self.pid_file);
        info!("Agent stopped");
        result
    }

    fn monitor(&self) -> Result<()> {
        let settings = self.settings.settings();
        let player = settings.player_name.clone();
        let gateway = SerializedGateway::new(CommandGateway::osascript(settings.script_timeout()));

        let (tx, rx) = crossbeam_channel::unbounded::<AgentEvent>();
        let stop = Arc::new(AtomicBool::new(false));

        let watcher_gateway = gateway.clone();
        let watcher_player = player.clone();
        let watcher = PlaybackWatcher::spawn(
            move || PlayerProbe::new(Box::new(watcher_gateway), Box::new(SysinfoLookup::new()), watcher_player),
            settings.watch_interval(),
            tx,
            Arc::clone(&stop),
        )
        .context("Failed to start playback watcher")?;

        let probe = PlayerProbe::new(Box::new(gateway), Box::new(SysinfoLookup::new()), player);
        let mut detector = AdDetector::new(
            probe,
            Box::new(self.settings.clone()),
            Box::new(self.status.clone()),
            Box::new(DesktopNotifier),
        );

        run_event_loop(&mut detector, &rx);
        detector.shutdown();

        stop.store(true, Ordering::SeqCst);
        if watcher.join().is_err() {
            error!("Playback watcher panicked");
        }
        Ok(())
    }
}

/// Feed events and timer ticks into `detector` until shutdown.
pub fn run_event_loop(detector: &mut AdDetector, events: &Receiver<AgentEvent>) {
    loop {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            info!("Shutdown requested");
            break;
        }

        let now = Instant::now();
        let idle_limit = now + MAX_IDLE;
        let wake_at = detector
            .next_deadline()
            .map_or(idle_limit, |deadline| deadline.min(idle_limit));

        match events.recv_deadline(wake_at) {
            Ok(AgentEvent::Playback(state)) => {
                detector.handle_playback_event(state, Instant::now());
            }
            Ok(AgentEvent::Shutdown) => {
                debug!("Shutdown event received");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                warn!("Event source disconnected, stopping");
                break;
            }
        }

        detector.run_due_timers(Instant::now());
    }
}

fn pid_file_path() -> Result<PathBuf> {
    Ok(config::get_data_dir()?.join(PID_FILE))
}

/// Location of the status file
pub fn status_file() -> Result<StatusFile> {
    Ok(StatusFile::new(config::get_data_dir()?.join(STATUS_FILE)))
}

fn read_pid(pid_file: &Path) -> Result<u32> {
    let pid_str = fs::read_to_string(pid_file)?;
    pid_str.trim().parse().context("Invalid PID in daemon file")
}

fn process_alive(pid: u32) -> bool {
    // Check if process exists by sending signal 0
    match Command::new("kill").args(["-0", &pid.to_string()]).status() {
        Ok(status) => status.success(),
        Err(_) => false,
    }
}

fn is_running_with_pid_file(pid_file: &Path) -> Result<bool> {
    if !pid_file.exists() {
        return Ok(false);
    }
    Ok(process_alive(read_pid(pid_file)?))
}

/// Check if the agent is running
pub fn is_daemon_running() -> Result<bool> {
    is_running_with_pid_file(&pid_file_path()?)
}

/// Stop the running agent
pub fn stop_daemon() -> Result<()> {
    let pid_file = pid_file_path()?;
    if !pid_file.exists() {
        bail!("Agent is not running");
    }

    let pid = read_pid(&pid_file)?;
    if !process_alive(pid) {
        let _ = fs::remove_file(&pid_file);
        bail!("Agent is not running (removed stale PID file)");
    }

    // SIGTERM lets the agent restore the volume before exiting
    Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .context("Failed to stop agent")?;

    info!("Agent stopped (PID: {pid})");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::test_support::{FakePlayer, RecordingNotifier, RecordingObserver};
    use tempfile::TempDir;

    fn create_test_detector(player: &FakePlayer, observer: &RecordingObserver) -> AdDetector {
        let settings = Settings {
            pause_bounce_on_mute: false,
            ..Settings::default()
        };
        AdDetector::new(
            player.probe(),
            Box::new(settings),
            Box::new(observer.clone()),
            Box::new(RecordingNotifier::default()),
        )
    }

    #[test]
    fn test_event_loop_mutes_ad_and_stops_on_shutdown() {
        let player = FakePlayer::new();
        let observer = RecordingObserver::default();
        let mut detector = create_test_detector(&player, &observer);
        player.set_volume(70);
        player.set_track("spotify:ad:1", 30_000);

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(AgentEvent::Playback(PlayerState::Playing)).unwrap();
        tx.send(AgentEvent::Shutdown).unwrap();
        run_event_loop(&mut detector, &rx);

        assert_eq!(detector.state(), PlaybackState::Muting);
        assert_eq!(player.volume(), 0);
        assert_eq!(observer.states(), vec![PlaybackState::Active, PlaybackState::Muting]);
    }

    #[test]
    fn test_event_loop_runs_settle_timer() {
        let player = FakePlayer::new();
        let observer = RecordingObserver::default();
        let mut detector = create_test_detector(&player, &observer);
        player.set_volume(55);
        player.set_track("spotify:ad:1", 30_000);

        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(AgentEvent::Playback(PlayerState::Playing)).unwrap();
        drop(tx);
        // Disconnected channel ends the loop right after the first event.
        run_event_loop(&mut detector, &rx);
        assert_eq!(player.volume(), 0);

        player.set_track("spotify:track:2", 180_000);
        detector.check(Instant::now());
        std::thread::sleep(crate::volume::SETTLE_DELAY + Duration::from_millis(20));
        detector.run_due_timers(Instant::now());

        assert_eq!(player.volume(), 55);
    }

    #[test]
    fn test_event_loop_stops_when_disconnected() {
        let player = FakePlayer::new();
        let observer = RecordingObserver::default();
        let mut detector = create_test_detector(&player, &observer);

        let (tx, rx) = crossbeam_channel::unbounded::<AgentEvent>();
        drop(tx);
        run_event_loop(&mut detector, &rx);

        assert_eq!(detector.state(), PlaybackState::Inactive);
    }

    #[test]
    fn test_agent_event_from_player_state() {
        assert_eq!(
            AgentEvent::from(PlayerState::Paused),
            AgentEvent::Playback(PlayerState::Paused)
        );
    }

    #[test]
    fn test_status_file_roundtrip() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let mut status = StatusFile::new(temp_dir.path().join("status.json"));
        assert_eq!(status.read()?, None);

        status.state_changed(PlaybackState::Muting);
        let record = status.read()?.expect("status should be written");
        assert_eq!(record.state, PlaybackState::Muting);
        assert_eq!(record.pid, std::process::id());
        assert!(record.updated_at > 0);
        Ok(())
    }

    #[test]
    fn test_status_file_uses_lowercase_states() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let status = StatusFile::new(temp_dir.path().join("status.json"));
        status.publish(PlaybackState::Inactive)?;

        let text = fs::read_to_string(status.path())?;
        assert!(text.contains("\"state\":\"inactive\""), "{text}");
        Ok(())
    }

    #[test]
    fn test_missing_pid_file_means_not_running() -> Result<()> {
        let temp_dir = TempDir::new()?;
        assert!(!is_running_with_pid_file(&temp_dir.path().join("none.pid"))?);
        Ok(())
    }

    #[test]
    fn test_own_pid_counts_as_running() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let pid_file = temp_dir.path().join("test.pid");
        fs::write(&pid_file, std::process::id().to_string())?;

        assert!(is_running_with_pid_file(&pid_file)?);
        Ok(())
    }

    #[test]
    fn test_garbage_pid_file_is_an_error() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let pid_file = temp_dir.path().join("test.pid");
        fs::write(&pid_file, "not-a-pid")?;

        assert!(is_running_with_pid_file(&pid_file).is_err());
        Ok(())
    }
}
