//! Remote-control link tracking.
//!
//! The receiver drives a "frame valid" line. The RC task samples it at
//! [`RC_POLL_PERIOD`], feeds a [`LinkWatchdog`], and publishes the result into
//! a [`SharedLinkStatus`] that the bench task reads on every tick.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::time::Duration;

use selftest_core::link::{LinkStatus, LinkWatchdog, RC_LINK_TIMEOUT, SharedLinkStatus};

use crate::bench::FirmwareInstant;
use crate::diagnostics;

/// Receiver sampling period (50 Hz, one servo frame).
pub const RC_POLL_PERIOD: Duration = Duration::from_millis(20);

pub struct RcLinkTracker<'a> {
    watchdog: LinkWatchdog<FirmwareInstant>,
    shared: &'a SharedLinkStatus,
    last: Option<LinkStatus>,
}

impl<'a> RcLinkTracker<'a> {
    pub const fn new(shared: &'a SharedLinkStatus) -> Self {
        Self {
            watchdog: LinkWatchdog::with_timeout(RC_LINK_TIMEOUT),
            shared,
            last: None,
        }
    }

    /// Folds one receiver sample into the watchdog and publishes the result.
    pub fn observe(&mut self, frame_seen: bool, now: FirmwareInstant) -> LinkStatus {
        if frame_seen {
            self.watchdog.record_frame(now);
        }

        let status = self.watchdog.status(now);
        self.shared.publish(status);
        if self.last != Some(status) {
            diagnostics::log_link_change(status);
            self.last = Some(status);
        }
        status
    }
}
