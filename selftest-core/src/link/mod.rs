//! Remote-control link state as seen by the bench arbiter.
//!
//! The remote-control decoder owns the link state. This module only reads it:
//! [`LinkMonitor`] wraps whatever [`LinkStatusSource`] the decoder exposes,
//! [`SharedLinkStatus`] is the single-word snapshot the firmware receiver task
//! publishes into, and [`LinkWatchdog`] turns frame arrival times into a
//! status.

use core::fmt;
use core::ops::Add;
use core::time::Duration;

use portable_atomic::{AtomicBool, Ordering};

/// Time without a received frame after which the link counts as lost.
pub const RC_LINK_TIMEOUT: Duration = Duration::from_secs(1);

/// Connectivity of the remote-control link.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

impl LinkStatus {
    pub const fn is_connected(self) -> bool {
        matches!(self, LinkStatus::Connected)
    }

    pub const fn label(self) -> &'static str {
        match self {
            LinkStatus::Connected => "connected",
            LinkStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Read-only view onto link state owned by the remote-control collaborator.
pub trait LinkStatusSource {
    /// Returns the current link state without side effects.
    fn read(&self) -> LinkStatus;
}

impl<T: LinkStatusSource + ?Sized> LinkStatusSource for &T {
    fn read(&self) -> LinkStatus {
        (**self).read()
    }
}

/// Fixed link state, used by host tooling and tests.
impl LinkStatusSource for LinkStatus {
    fn read(&self) -> LinkStatus {
        *self
    }
}

/// Link status monitor consulted by the bench task every tick.
pub struct LinkMonitor<S> {
    source: S,
}

impl<S: LinkStatusSource> LinkMonitor<S> {
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    /// Samples the collaborator. No caching happens here.
    pub fn read(&self) -> LinkStatus {
        self.source.read()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

/// Single-producer snapshot of the link state shared across tasks.
///
/// Starts out [`LinkStatus::Connected`] so bench testing stays locked out
/// until the receiver has reported a lost link at least once.
pub struct SharedLinkStatus {
    connected: AtomicBool,
}

impl SharedLinkStatus {
    pub const fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
        }
    }

    /// Publishes the latest state. Called only by the receiver task.
    pub fn publish(&self, status: LinkStatus) {
        self.connected.store(status.is_connected(), Ordering::Relaxed);
    }
}

impl Default for SharedLinkStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkStatusSource for SharedLinkStatus {
    fn read(&self) -> LinkStatus {
        if self.connected.load(Ordering::Relaxed) {
            LinkStatus::Connected
        } else {
            LinkStatus::Disconnected
        }
    }
}

/// Derives link state from the time the last remote-control frame arrived.
#[derive(Copy, Clone, Debug)]
pub struct LinkWatchdog<I> {
    timeout: Duration,
    last_frame: Option<I>,
}

impl<I> LinkWatchdog<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    /// Creates a watchdog using [`RC_LINK_TIMEOUT`].
    pub const fn new() -> Self {
        Self::with_timeout(RC_LINK_TIMEOUT)
    }

    pub const fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            last_frame: None,
        }
    }

    /// Notes that a valid frame was received at `now`.
    pub fn record_frame(&mut self, now: I) {
        self.last_frame = Some(now);
    }

    /// Returns the link state at `now`. No frame yet means disconnected.
    pub fn status(&self, now: I) -> LinkStatus {
        match self.last_frame {
            Some(last) if now < last + self.timeout => LinkStatus::Connected,
            _ => LinkStatus::Disconnected,
        }
    }

    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    pub const fn last_frame(&self) -> Option<I> {
        self.last_frame
    }
}

impl<I> Default for LinkWatchdog<I>
where
    I: Copy + Ord + Add<Duration, Output = I>,
{
    fn default() -> Self {
        Self::new()
    }
}
