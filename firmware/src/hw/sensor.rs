//! ADC1 sampling of the bench load sensor on PA0.

use embassy_stm32::Peri;
use embassy_stm32::adc::{Adc, AdcChannel, AnyAdcChannel, SampleTime};
use embassy_stm32::peripherals::{ADC1, PA0};
use selftest_core::task::RawSampleSource;

/// Blocking ADC reader feeding the telemetry pipeline.
pub struct AdcSampleSource<'d> {
    adc: Adc<'d, ADC1>,
    channel: AnyAdcChannel<ADC1>,
    discard_next: bool,
}

impl<'d> AdcSampleSource<'d> {
    pub fn new(adc: Peri<'d, ADC1>, pin: Peri<'d, PA0>) -> Self {
        let mut adc = Adc::new(adc);
        adc.set_sample_time(SampleTime::CYCLES160_5);
        Self {
            adc,
            channel: pin.degrade_adc(),
            discard_next: true,
        }
    }

    fn read_once(&mut self) -> u16 {
        self.adc.blocking_read(&mut self.channel)
    }
}

impl RawSampleSource for AdcSampleSource<'_> {
    fn read_raw(&mut self) -> i32 {
        // First conversion after power-up settles the sample capacitor.
        if self.discard_next {
            let _ = self.read_once();
            self.discard_next = false;
        }

        i32::from(self.read_once())
    }
}
