//! # Command-Line Interface Module
//!
//! Defines the command-line interface for Spotimute using Clap derive macros.
//!
//! ## Commands
//!
//! - `run`: Run the ad muting agent in the foreground
//! - `daemon`: Start, stop or query the background agent
//! - `status`: Show the agent's last published state
//! - `check`: Probe the player once and print what the agent would see
//! - `config`: Show or change settings
//! - `toggle-notifications`: Flip the "notify on mute" switch
//!
//! ## Examples
//!
//! ```bash
//! spotimute daemon start
//! spotimute config set poll-interval-seconds 0.5
//! spotimute toggle-notifications
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Main application arguments structure.
#[derive(Parser, Debug)]
#[command(name = "spotimute")]
#[command(about = "Spotimute: mutes Spotify ads and turns the music back up afterwards")]
#[command(version)]
pub struct Args {
    /// Settings file to use instead of the default location
    #[arg(long, global = true, env = "SPOTIMUTE_CONFIG")]
    pub config: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the agent in the foreground
    ///
    /// Watches the player, mutes ads and restores the volume when music
    /// resumes. Stops on Ctrl-C, restoring the volume if an ad was muted.
    Run,

    /// Manage the background agent
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },

    /// Show the agent's last published state
    Status,

    /// Probe the player once and print the result
    ///
    /// Reports whether the player is running, the current item and how it is
    /// classified, its duration and the volume. Changes nothing.
    Check,

    /// Show or change settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Turn mute notifications on or off
    ToggleNotifications,

    /// Generate shell completion scripts
    ///
    /// Outputs completion script for the specified shell to stdout.
    /// Redirect to appropriate file for your shell to enable completions.
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Daemon management actions
#[derive(Subcommand, Debug)]
pub enum DaemonAction {
    /// Start the agent in the background
    Start,

    /// Stop the running agent, restoring the volume if needed
    Stop,

    /// Check whether the agent is running
    Status,
}

/// Settings actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective settings as JSON
    Show,

    /// Print the settings file location
    Path,

    /// Write the default settings
    Reset,

    /// Change a single setting
    Set {
        /// Setting name, e.g. `poll-interval-seconds`
        key: String,
        /// New value
        value: String,
    },
}
