//! # Spotimute
//!
//! Mutes Spotify while it plays advertisements and restores the previous
//! volume when music resumes.
//!
//! ## Usage
//!
//! ```bash
//! # Run in the foreground
//! spotimute run
//!
//! # Run in the background
//! spotimute daemon start
//! spotimute status
//! spotimute daemon stop
//!
//! # Inspect what the agent sees right now
//! spotimute check
//! ```

use anyhow::{bail, Result};
use clap::{CommandFactory, Parser};
use log::info;
use spotimute::cli::{self, ConfigAction, DaemonAction};
use spotimute::config::{ConfigProvider, Settings, SettingsFile};
use spotimute::daemon::{self, Agent};
use spotimute::gateway::CommandGateway;
use spotimute::completion;
use spotimute::probe::{PlayerProbe, SysinfoLookup};

/// Main entry point.
///
/// Initializes logging, parses command-line arguments, and routes commands
/// to the library modules.
///
/// # Logging
///
/// Logs at `info` by default; override with `RUST_LOG`:
/// - `RUST_LOG=debug spotimute run` - Every check and timer
/// - `RUST_LOG=spotimute::gateway=trace spotimute run` - Module-specific logging
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = cli::Args::parse();
    let settings_file = SettingsFile::locate(args.config.as_deref())?;

    match args.command {
        cli::Command::Run => {
            let mut agent = Agent::new(settings_file)?;
            agent.start_monitoring()?;
        }
        cli::Command::Daemon { action } => match action {
            DaemonAction::Start => {
                if daemon::is_daemon_running()? {
                    eprintln!("Agent is already running");
                    return Ok(());
                }

                // Fork and start the agent in the background
                match unsafe { libc::fork() } {
                    0 => {
                        let mut agent = Agent::new(settings_file)?;
                        agent.start_monitoring()?;
                        std::process::exit(0);
                    }
                    pid if pid > 0 => {
                        println!("Starting ad muting agent...");
                        std::thread::sleep(std::time::Duration::from_millis(500));

                        if daemon::is_daemon_running()? {
                            println!("Agent started successfully");
                        } else {
                            eprintln!("Failed to start agent");
                        }
                    }
                    _ => bail!("Failed to fork process"),
                }
            }
            DaemonAction::Stop => {
                daemon::stop_daemon()?;
                println!("Agent stopped");
            }
            DaemonAction::Status => {
                if daemon::is_daemon_running()? {
                    println!("Agent is running");
                } else {
                    println!("Agent is not running");
                }
            }
        },
        cli::Command::Status => {
            let running = daemon::is_daemon_running()?;
            match daemon::status_file()?.read()? {
                Some(record) if running => println!("Spotimute is {}", record.state),
                Some(record) => println!("Agent is not running (last state: {})", record.state),
                None if running => println!("Agent is running"),
                None => println!("Agent is not running"),
            }
        }
        cli::Command::Check => {
            let settings = settings_file.settings();
            print_check(&settings);
        }
        cli::Command::Config { action } => match action {
            ConfigAction::Show => {
                let settings = settings_file.load()?;
                println!("{}", serde_json::to_string_pretty(&settings)?);
            }
            ConfigAction::Path => {
                println!("{}", settings_file.path().display());
            }
            ConfigAction::Reset => {
                settings_file.save(&Settings::default())?;
                println!("Settings reset to defaults");
            }
            ConfigAction::Set { key, value } => {
                settings_file.update(|settings| settings.set(&key, &value))?;
                info!("Updated {key} in {}", settings_file.path().display());
                println!("{key} = {value}");
            }
        },
        cli::Command::ToggleNotifications => {
            let settings = settings_file.update(|settings| {
                settings.notifications_enabled = !settings.notifications_enabled;
                Ok(())
            })?;
            let word = if settings.notifications_enabled { "on" } else { "off" };
            println!("Notifications are now {word}");
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
    }

    Ok(())
}

/// Probe the player once and print what the agent would act on.
fn print_check(settings: &Settings) {
    let mut probe = PlayerProbe::new(
        Box::new(CommandGateway::osascript(settings.script_timeout())),
        Box::new(SysinfoLookup::new()),
        settings.player_name.clone(),
    );

    if !probe.is_player_running() {
        println!("{} is not running", probe.player_name());
        return;
    }

    let track = probe.current_track_reference();
    println!("Player:   {}", probe.player_name());
    match probe.player_state() {
        Some(state) => println!("State:    {state}"),
        None => println!("State:    unknown"),
    }
    println!("Item:     {}", if track.id.is_empty() { "-" } else { track.id.as_str() });
    println!("Kind:     {}", track.kind);
    println!("Duration: {:.1}s", probe.current_track_duration_seconds());
    println!("Volume:   {}", probe.current_volume());
}
