use embassy_stm32::Peri;
use embassy_stm32::gpio::{Input, Pull};
use embassy_stm32::peripherals::PB5;
use embassy_time::Ticker;
use selftest_core::link::SharedLinkStatus;

use crate::bench::{FirmwareInstant, to_embassy_duration};
use crate::link::{RC_POLL_PERIOD, RcLinkTracker};

/// Samples the receiver's frame-valid line and publishes the link state.
#[embassy_executor::task]
pub async fn run(pin: Peri<'static, PB5>, shared: &'static SharedLinkStatus) -> ! {
    // Pulled low so an unplugged receiver reads as "no frames".
    let frame_valid = Input::new(pin, Pull::Down);
    let mut tracker = RcLinkTracker::new(shared);
    let mut ticker = Ticker::every(to_embassy_duration(RC_POLL_PERIOD));

    loop {
        tracker.observe(frame_valid.is_high(), FirmwareInstant::now());
        ticker.next().await;
    }
}
