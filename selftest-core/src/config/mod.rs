//! Compile-time bench configuration.

use core::time::Duration;

use crate::sequences::{DUCT_FAN_SWEEP_PROFILE, SweepProfile};
use crate::telemetry::LowPassConfig;

/// Scheduler period used when no override is supplied.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(10);

/// Tunables shared by the firmware and the emulator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BenchConfig {
    /// Interval between two `BenchTask::tick` calls.
    pub tick_period: Duration,
    pub sweep: SweepProfile,
    pub lowpass: LowPassConfig,
    /// Sample lines between repeated column headers; `0` prints it once.
    pub header_interval: u32,
}

impl BenchConfig {
    pub const DEFAULT: Self = Self {
        tick_period: DEFAULT_TICK_PERIOD,
        sweep: DUCT_FAN_SWEEP_PROFILE,
        lowpass: LowPassConfig::DEFAULT,
        header_interval: 0,
    };

    /// Returns a copy with a different tick period. A zero period is ignored.
    #[must_use]
    pub const fn with_tick_period(mut self, period: Duration) -> Self {
        if !period.is_zero() {
            self.tick_period = period;
        }
        self
    }

    #[must_use]
    pub const fn with_header_interval(mut self, interval: u32) -> Self {
        self.header_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_sweep(mut self, sweep: SweepProfile) -> Self {
        self.sweep = sweep;
        self
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_runs_at_one_hundred_hertz() {
        let config = BenchConfig::default();
        assert_eq!(config.tick_period, Duration::from_millis(10));
        assert_eq!(config.header_interval, 0);
        assert_eq!(config.sweep.validate(), Ok(()));
    }

    #[test]
    fn zero_tick_period_is_ignored() {
        let config = BenchConfig::DEFAULT.with_tick_period(Duration::ZERO);
        assert_eq!(config.tick_period, DEFAULT_TICK_PERIOD);

        let config = BenchConfig::DEFAULT.with_tick_period(Duration::from_millis(20));
        assert_eq!(config.tick_period, Duration::from_millis(20));
    }
}
