#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! The bench task publishes a [`StatusSnapshot`] after every tick; the console
//! task copies the latest one out when the operator asks for `status`.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use selftest_core::console::StatusSnapshot;

#[cfg(target_os = "none")]
type StatusMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type StatusMutex = NoopRawMutex;

/// Latest bench status, written by one task and read by another.
pub struct StatusBoard {
    latest: Mutex<StatusMutex, Cell<StatusSnapshot>>,
}

impl StatusBoard {
    pub const fn new() -> Self {
        Self {
            latest: Mutex::new(Cell::new(StatusSnapshot::unknown())),
        }
    }

    pub fn publish(&self, snapshot: StatusSnapshot) {
        self.latest.lock(|cell| cell.set(snapshot));
    }

    /// Returns the most recent snapshot ([`StatusSnapshot::unknown`] before the first tick).
    pub fn snapshot(&self) -> StatusSnapshot {
        self.latest.lock(Cell::get)
    }
}
