//! Agent that silences Spotify advertisements and restores the volume afterwards.
//!
//! Core modules:
//! - [`detector`] - Ad detection state machine
//! - [`volume`] - Mute/restore with the settle delay
//! - [`probe`] - Typed reads and writes against the player
//! - [`gateway`] - Script execution through the automation interpreter
//! - [`daemon`] - Agent loop, PID and status files
//!
//! ### Supporting Modules
//!
//! - [`track`] - Track identifiers, classification and player answers
//! - [`timer`] - Recurring poll timer
//! - [`watcher`] - Playback-state event source
//! - [`notifier`] - Desktop notifications
//! - [`config`] - Settings file and data directory management
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use spotimute::config::SettingsFile;
//! use spotimute::daemon::Agent;
//!
//! let settings = SettingsFile::locate(None)?;
//! let mut agent = Agent::new(settings)?;
//! agent.start_monitoring()?; // Runs until SIGINT/SIGTERM
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## How Ads Are Detected
//!
//! The player exposes the identifier of the current item. Identifiers with
//! the `spotify:ad` scheme are ads; `spotify:track`, `spotify:local` and
//! `spotify:episode` are content. Anything else, including no answer at all,
//! is treated like an ad.
//!
//! The player only announces play/pause transitions, so boundaries between
//! an ad and a track inside one playing session are found by polling
//! (300 ms by default) plus a look-ahead check at the expected end of each
//! track.
//!
//! ## Muting
//!
//! ```no_run
//! # use spotimute::detector::AdDetector;
//! # fn demo(detector: &mut AdDetector) {
//! use std::time::Instant;
//!
//! // One check: classify, then mute or schedule the restore
//! detector.check(Instant::now());
//!
//! // Later, fire whatever timers are due (poll, look-ahead, restore)
//! detector.run_due_timers(Instant::now());
//! # }
//! ```
//!
//! The pre-mute volume is captured once per ad. It is restored 0.75 s after
//! a real track is seen again, which covers the player still emitting the
//! tail of the ad. Ads back to back never overwrite the captured volume
//! with the muted level.

pub mod cli;
pub mod completion;
pub mod config;
pub mod daemon;
pub mod detector;
pub mod gateway;
pub mod notifier;
pub mod probe;
pub mod timer;
pub mod track;
pub mod volume;
pub mod watcher;

#[cfg(test)]
mod test_support;
