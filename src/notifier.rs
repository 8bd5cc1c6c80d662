//! # Notification Emitter
//!
//! Tells the user an ad has been muted. Delivery is fire-and-forget: a failed
//! notification is logged and otherwise ignored.

use log::{debug, warn};

/// Title of every notification
pub const NOTIFICATION_TITLE: &str = "Spotimute";

/// Factor applied to the ad duration in the "muting for" estimate.
///
/// Doubled to leave slack for detection latency; tune here.
pub const AD_ESTIMATE_MULTIPLIER: f64 = 2.0;

/// Desktop notification surface.
pub trait Notifier {
    fn request_notification(&self, title: &str, body: &str);
}

/// Notifications through the OS notification centre.
#[derive(Debug, Default, Clone, Copy)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn request_notification(&self, title: &str, body: &str) {
        let result = notify_rust::Notification::new()
            .summary(title)
            .body(body)
            .show();
        if let Err(e) = result {
            warn!("Could not show notification: {e}");
        }
    }
}

/// Body text for a muted ad of `ad_duration_seconds` (0 when unknown)
pub fn mute_message(ad_duration_seconds: f64) -> String {
    let estimate = ad_duration_seconds * AD_ESTIMATE_MULTIPLIER;
    if estimate.is_finite() && estimate >= 1.0 {
        format!("Muting ad for about {} seconds", estimate.round() as u64)
    } else {
        "Muting ad".to_string()
    }
}

/// Formats and sends the single "ad muted" message.
pub struct NotificationEmitter {
    notifier: Box<dyn Notifier>,
}

impl NotificationEmitter {
    pub fn new(notifier: Box<dyn Notifier>) -> Self {
        Self { notifier }
    }

    pub fn notify(&self, text: &str) {
        debug!("Notification: {text}");
        self.notifier.request_notification(NOTIFICATION_TITLE, text);
    }

    /// Announce a muted ad, if the user asked for notifications.
    pub fn ad_muted(&self, enabled: bool, ad_duration_seconds: f64) {
        if enabled {
            self.notify(&mute_message(ad_duration_seconds));
        }
    }
}
