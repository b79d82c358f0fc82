//! Board peripherals behind the `selftest-core` collaborator traits.
//!
//! The servo output runs as a 50 Hz PWM frame; pulse widths from the sweep
//! profile are converted into timer compare values by [`pulse_to_duty`].

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use selftest_core::sequences::PulseWidth;

#[cfg(target_os = "none")]
pub mod pwm;
#[cfg(target_os = "none")]
pub mod sensor;

/// Servo/ESC frame rate.
pub const SERVO_FREQUENCY_HZ: u32 = 50;
/// Length of one servo frame in microseconds.
pub const SERVO_PERIOD_US: u32 = 1_000_000 / SERVO_FREQUENCY_HZ;

/// Maps a pulse width onto a compare value for a timer whose full period is `max_duty`.
///
/// Pulses longer than one frame saturate at `max_duty`.
pub fn pulse_to_duty(pulse: PulseWidth, max_duty: u16) -> u16 {
    let micros = u32::from(pulse.as_micros()).min(SERVO_PERIOD_US);
    let duty = micros * u32::from(max_duty) / SERVO_PERIOD_US;
    u16::try_from(duty).unwrap_or(max_duty)
}
