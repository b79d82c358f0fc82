//! Self-test phase and sweep profile data structures shared by firmware and host targets.
//!
//! The sequencer uses these definitions to drive the bench self-test state
//! machine without embedding any MCU-specific knowledge. Everything in this
//! module is `no_std` friendly so the same data can be compiled for both the
//! STM32 firmware and the host-side emulator.

use core::fmt;
use core::time::Duration;

pub mod sweep;

pub use sweep::{DUCT_FAN_SWEEP_PROFILE, duct_fan_sweep_profile};

/// Phases of the bench self-test state machine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SelfTestPhase {
    Idle,
    ActuatorSweep,
    KinematicsInit,
    Done,
}

impl SelfTestPhase {
    /// Returns `true` when the phase commands hardware or solver state.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            SelfTestPhase::ActuatorSweep | SelfTestPhase::KinematicsInit
        )
    }

    /// Returns `true` when the state machine may move from `self` to `next`.
    ///
    /// Every phase may fall back to [`SelfTestPhase::Idle`]; forward moves
    /// follow the sweep → kinematics → done order and never skip a phase.
    pub const fn can_transition_to(self, next: SelfTestPhase) -> bool {
        matches!(
            (self, next),
            (SelfTestPhase::Idle, SelfTestPhase::ActuatorSweep)
                | (SelfTestPhase::ActuatorSweep, SelfTestPhase::KinematicsInit)
                | (SelfTestPhase::KinematicsInit, SelfTestPhase::Done)
                | (
                    SelfTestPhase::ActuatorSweep
                        | SelfTestPhase::KinematicsInit
                        | SelfTestPhase::Done,
                    SelfTestPhase::Idle
                )
        )
    }

    /// Short kebab-case label used in telemetry and console output.
    pub const fn label(self) -> &'static str {
        match self {
            SelfTestPhase::Idle => "idle",
            SelfTestPhase::ActuatorSweep => "actuator-sweep",
            SelfTestPhase::KinematicsInit => "kinematics-init",
            SelfTestPhase::Done => "done",
        }
    }
}

impl fmt::Display for SelfTestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Logical PWM output driven during the actuator sweep.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PwmChannel(u8);

impl PwmChannel {
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u8 {
        self.0
    }
}

impl fmt::Display for PwmChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Servo-style pulse width in microseconds handed to the PWM driver.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseWidth(u16);

impl PulseWidth {
    pub const fn from_micros(micros: u16) -> Self {
        Self(micros)
    }

    pub const fn as_micros(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PulseWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Single output level held for a fixed duration during the sweep.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SweepStep {
    pub channel: PwmChannel,
    pub pulse: PulseWidth,
    pub hold_for: Duration,
}

impl SweepStep {
    pub const fn new(channel: PwmChannel, pulse: PulseWidth, hold_for: Duration) -> Self {
        Self {
            channel,
            pulse,
            hold_for,
        }
    }

    /// Returns the hold duration as a [`Duration`].
    pub fn hold_duration(&self) -> Duration {
        self.hold_for
    }
}

/// Reasons a sweep profile is refused before it can drive hardware.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProfileError {
    /// The profile contains no steps.
    Empty,
    /// A step commands a pulse above the bench test limit.
    ExceedsTestLimit { index: usize, pulse: PulseWidth },
    /// A step commands a pulse below the neutral output.
    BelowNeutral { index: usize, pulse: PulseWidth },
    /// A step has a zero hold and would never be observed.
    ZeroHold { index: usize },
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::Empty => f.write_str("sweep profile has no steps"),
            ProfileError::ExceedsTestLimit { index, pulse } => {
                write!(f, "step {index} pulse {pulse} exceeds the test limit")
            }
            ProfileError::BelowNeutral { index, pulse } => {
                write!(f, "step {index} pulse {pulse} is below neutral")
            }
            ProfileError::ZeroHold { index } => write!(f, "step {index} has a zero hold"),
        }
    }
}

/// Immutable actuator sweep description shared across targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SweepProfile {
    pub steps: &'static [SweepStep],
    pub neutral: PulseWidth,
    pub test_limit: PulseWidth,
}

impl SweepProfile {
    pub const fn new(
        steps: &'static [SweepStep],
        neutral: PulseWidth,
        test_limit: PulseWidth,
    ) -> Self {
        Self {
            steps,
            neutral,
            test_limit,
        }
    }

    /// Returns the ordered steps that make up the sweep.
    pub const fn steps(&self) -> &'static [SweepStep] {
        self.steps
    }

    /// Returns the number of steps contained in the profile.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Sum of every step hold.
    pub fn total_duration(&self) -> Duration {
        self.steps
            .iter()
            .fold(Duration::ZERO, |total, step| total + step.hold_for)
    }

    /// Checks that every step stays inside `[neutral, test_limit]` and is observable.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.steps.is_empty() {
            return Err(ProfileError::Empty);
        }

        for (index, step) in self.steps.iter().enumerate() {
            if step.pulse > self.test_limit {
                return Err(ProfileError::ExceedsTestLimit {
                    index,
                    pulse: step.pulse,
                });
            }
            if step.pulse < self.neutral {
                return Err(ProfileError::BelowNeutral {
                    index,
                    pulse: step.pulse,
                });
            }
            if step.hold_for.is_zero() {
                return Err(ProfileError::ZeroHold { index });
            }
        }

        Ok(())
    }
}
