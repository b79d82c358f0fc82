//! Firmware clock binding for the shared bench task.
//!
//! `selftest-core` is generic over its instant type. The firmware feeds it
//! Embassy's monotonic clock through [`FirmwareInstant`], which adds the
//! `core::time::Duration` arithmetic the sequencer relies on.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::ops::Add;
use core::time::Duration;

use embassy_time::{Duration as EmbassyDuration, Instant};
use selftest_core::telemetry::{MonotonicInstant, TimestampMillis};

/// Embassy instant wrapped for use with `selftest-core`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(Instant::from_micros(micros))
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(value: Instant) -> Self {
        Self(value)
    }
}

impl Add<Duration> for FirmwareInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(
            self.0
                .checked_add(to_embassy_duration(rhs))
                .unwrap_or(Instant::MAX),
        )
    }
}

impl MonotonicInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_duration_since(earlier.0).as_micros())
    }

    fn as_millis(&self) -> TimestampMillis {
        self.0.as_millis()
    }
}

/// Converts a core duration into Embassy ticks, saturating on overflow.
pub fn to_embassy_duration(duration: Duration) -> EmbassyDuration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    EmbassyDuration::from_micros(micros)
}
