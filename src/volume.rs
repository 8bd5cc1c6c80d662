//! # Volume Controller
//!
//! Zeroes the player volume while an ad plays and puts it back afterwards.
//!
//! The volume in effect when a mute begins is captured once into a
//! [`VolumeSnapshot`] and held until the matching restore completes, so a
//! change made by someone else while muted is overwritten with the pre-mute
//! level. Restoration waits for [`SETTLE_DELAY`] to avoid an audible jump
//! right at the track boundary; a new mute cancels a pending restore.

use crate::probe::PlayerProbe;
use log::{debug, info};
use std::time::{Duration, Instant};

/// Pause between deciding to unmute and writing the volume back
pub const SETTLE_DELAY: Duration = Duration::from_millis(750);

/// Pre-mute volume and whether we currently hold the player muted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumeSnapshot {
    pub stored_volume: u8,
    pub is_muted: bool,
}

#[derive(Debug, Default)]
pub struct VolumeController {
    snapshot: VolumeSnapshot,
    pending_restore: Option<Instant>,
}

impl VolumeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> VolumeSnapshot {
        self.snapshot
    }

    pub fn is_muted(&self) -> bool {
        self.snapshot.is_muted
    }

    /// When the scheduled restore is due, if one is pending
    pub fn restore_deadline(&self) -> Option<Instant> {
        self.pending_restore
    }

    /// Silence the player, capturing the current volume unless already held.
    pub fn mute(&mut self, probe: &mut PlayerProbe, bounce: bool) {
        if self.pending_restore.take().is_some() {
            debug!("Cancelled pending volume restore");
        }

        if !self.snapshot.is_muted {
            let volume = probe.current_volume();
            self.snapshot = VolumeSnapshot {
                stored_volume: volume,
                is_muted: true,
            };
            debug!("Captured pre-mute volume {volume}");
        }

        probe.set_volume(0);
        if bounce {
            probe.pause_then_resume();
        }
    }

    /// Schedule the restore for `now + SETTLE_DELAY`.
    ///
    /// Returns `false` when nothing is muted. An already pending restore keeps
    /// its original deadline.
    pub fn schedule_restore(&mut self, now: Instant) -> bool {
        if !self.snapshot.is_muted {
            return false;
        }
        if self.pending_restore.is_none() {
            self.pending_restore = Some(now + SETTLE_DELAY);
        }
        true
    }

    /// Run the scheduled restore once its deadline has passed.
    pub fn restore_if_due(&mut self, probe: &mut PlayerProbe, now: Instant) -> bool {
        match self.pending_restore {
            Some(at) if at <= now => {
                self.restore_now(probe);
                true
            }
            _ => false,
        }
    }

    /// Write the stored volume back immediately and clear the snapshot.
    ///
    /// Skipped while the player is not running, since any automation call
    /// would relaunch it; the snapshot is then kept for the next unmute.
    pub fn restore_now(&mut self, probe: &mut PlayerProbe) {
        self.pending_restore = None;
        if !self.snapshot.is_muted {
            return;
        }
        if !probe.is_player_running() {
            debug!("Player gone, keeping volume snapshot for later");
            return;
        }

        let volume = self.snapshot.stored_volume;
        probe.set_volume(volume);
        self.snapshot = VolumeSnapshot::default();
        info!("Restored volume to {volume}");
    }
}
