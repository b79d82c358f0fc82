//! Duct-fan sweep profile shared by firmware and host targets.
//!
//! The ESC on the duct fan arms at a 1000 us pulse. The sweep ramps the fan
//! from neutral up to a bounded bench value and back down, holding each level
//! for a quarter second so the operator can hear every step.

use core::time::Duration;

use super::{PulseWidth, PwmChannel, SweepProfile, SweepStep};

/// Timer output wired to the duct-fan ESC.
pub const DUCT_FAN_CHANNEL: PwmChannel = PwmChannel::new(0);
/// Pulse width that keeps the ESC armed with the fan stopped.
pub const NEUTRAL_PULSE: PulseWidth = PulseWidth::from_micros(1_000);
/// Highest pulse the bench sweep may command.
pub const SWEEP_TEST_LIMIT: PulseWidth = PulseWidth::from_micros(1_500);
/// Hold applied to each sweep level.
pub const SWEEP_STEP_HOLD: Duration = Duration::from_millis(250);

/// Ordered levels applied during the actuator sweep.
pub const DUCT_FAN_SWEEP_STEPS: [SweepStep; 5] = [
    SweepStep::new(DUCT_FAN_CHANNEL, NEUTRAL_PULSE, SWEEP_STEP_HOLD),
    SweepStep::new(
        DUCT_FAN_CHANNEL,
        PulseWidth::from_micros(1_250),
        SWEEP_STEP_HOLD,
    ),
    SweepStep::new(DUCT_FAN_CHANNEL, SWEEP_TEST_LIMIT, SWEEP_STEP_HOLD),
    SweepStep::new(
        DUCT_FAN_CHANNEL,
        PulseWidth::from_micros(1_250),
        SWEEP_STEP_HOLD,
    ),
    SweepStep::new(DUCT_FAN_CHANNEL, NEUTRAL_PULSE, SWEEP_STEP_HOLD),
];

/// Sweep profile used when no override is configured.
pub const DUCT_FAN_SWEEP_PROFILE: SweepProfile =
    SweepProfile::new(&DUCT_FAN_SWEEP_STEPS, NEUTRAL_PULSE, SWEEP_TEST_LIMIT);

/// Returns the default duct-fan sweep profile.
pub const fn duct_fan_sweep_profile() -> SweepProfile {
    DUCT_FAN_SWEEP_PROFILE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duct_fan_sweep_ramps_up_and_back_to_neutral() {
        let profile = duct_fan_sweep_profile();
        let steps = profile.steps();

        assert_eq!(profile.validate(), Ok(()));
        assert_eq!(steps.first().map(|step| step.pulse), Some(NEUTRAL_PULSE));
        assert_eq!(steps.last().map(|step| step.pulse), Some(NEUTRAL_PULSE));
        assert!(steps.iter().all(|step| step.channel == DUCT_FAN_CHANNEL));
        assert_eq!(
            steps.iter().map(|step| step.pulse).max(),
            Some(SWEEP_TEST_LIMIT)
        );
        assert_eq!(profile.total_duration(), Duration::from_millis(1_250));
    }
}
