//! Typed views of raw player output: track references, durations, volumes
//! and the player's transport state.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// URI prefixes of sponsored content
const AD_PREFIXES: &[&str] = &["spotify:ad"];

/// URI prefixes of real content
const TRACK_PREFIXES: &[&str] = &["spotify:track", "spotify:local", "spotify:episode"];

/// What the player is currently playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Track,
    Advertisement,
    /// Empty or garbled answer; treated like an ad by the detector.
    Unknown,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Track => write!(f, "track"),
            TrackKind::Advertisement => write!(f, "advertisement"),
            TrackKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Identifier of the current item plus its classification.
///
/// Recomputed on every poll and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackReference {
    pub id: String,
    pub kind: TrackKind,
}

impl TrackReference {
    /// Classify a raw `spotify url of current track` answer
    pub fn classify(raw: &str) -> Self {
        let id = raw.trim();
        let kind = if id.is_empty() {
            TrackKind::Unknown
        } else if AD_PREFIXES.iter().any(|p| has_scheme(id, p)) {
            TrackKind::Advertisement
        } else if TRACK_PREFIXES.iter().any(|p| has_scheme(id, p)) {
            TrackKind::Track
        } else {
            TrackKind::Unknown
        };

        Self {
            id: id.to_string(),
            kind,
        }
    }

    /// Reference used when the player gave no usable answer
    pub fn unknown() -> Self {
        Self {
            id: String::new(),
            kind: TrackKind::Unknown,
        }
    }

    pub fn is_track(&self) -> bool {
        self.kind == TrackKind::Track
    }
}

/// `spotify:ad` matches `spotify:ad` and `spotify:ad:xyz` but not `spotify:adventure`.
fn has_scheme(id: &str, prefix: &str) -> bool {
    match id.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(':'),
        None => false,
    }
}

/// Parse a track duration reported in milliseconds into seconds.
///
/// Returns `None` for anything that is not a finite, non-negative number.
pub fn parse_duration_seconds(raw: &str) -> Option<f64> {
    let millis: f64 = raw.trim().parse().ok()?;
    if millis.is_finite() && millis >= 0.0 {
        Some(millis / 1000.0)
    } else {
        None
    }
}

/// Parse a sound volume, clamped to `0..=100`.
pub fn parse_volume(raw: &str) -> Option<u8> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(value.round().clamp(0.0, 100.0) as u8)
}

/// Transport state of the player, as carried by playback-state-changed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Playing,
    Paused,
    Stopped,
}

impl FromStr for PlayerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "playing" => Ok(PlayerState::Playing),
            "paused" => Ok(PlayerState::Paused),
            "stopped" => Ok(PlayerState::Stopped),
            other => Err(format!("unrecognised player state '{other}'")),
        }
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Stopped => write!(f, "stopped"),
        }
    }
}
