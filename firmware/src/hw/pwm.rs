//! TIM3 servo output driving the duct-fan ESC.

use embassy_stm32::Peri;
use embassy_stm32::gpio::OutputType;
use embassy_stm32::peripherals::{PA6, TIM3};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::low_level::CountingMode;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use selftest_core::sequencer::ActuatorDriver;
use selftest_core::sequences::sweep::{DUCT_FAN_CHANNEL, NEUTRAL_PULSE};
use selftest_core::sequences::{PulseWidth, PwmChannel};

use super::{SERVO_FREQUENCY_HZ, pulse_to_duty};

/// [`ActuatorDriver`] for the single ESC wired to TIM3 CH1 (PA6).
pub struct PwmActuator<'d> {
    pwm: SimplePwm<'d, TIM3>,
    max_duty: u16,
}

impl<'d> PwmActuator<'d> {
    pub fn new(timer: Peri<'d, TIM3>, pin: Peri<'d, PA6>) -> Self {
        let mut pwm = SimplePwm::new(
            timer,
            Some(PwmPin::new(pin, OutputType::PushPull)),
            None,
            None,
            None,
            Hertz(SERVO_FREQUENCY_HZ),
            CountingMode::EdgeAlignedUp,
        );
        let max_duty = pwm.ch1().max_duty_cycle();
        pwm.ch1().set_duty_cycle(pulse_to_duty(NEUTRAL_PULSE, max_duty));
        pwm.ch1().enable();

        Self { pwm, max_duty }
    }
}

impl ActuatorDriver for PwmActuator<'_> {
    fn set_duty_cycle(&mut self, channel: PwmChannel, pulse: PulseWidth) {
        if channel != DUCT_FAN_CHANNEL {
            defmt::warn!("pwm: ignoring unknown channel {}", channel.index());
            return;
        }
        let duty = pulse_to_duty(pulse, self.max_duty);
        self.pwm.ch1().set_duty_cycle(duty);
    }

    fn command_neutral(&mut self) {
        self.set_duty_cycle(DUCT_FAN_CHANNEL, NEUTRAL_PULSE);
    }
}
