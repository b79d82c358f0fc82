//! RTT panic reporter, selected with the `panic-log` feature.

use core::panic::PanicInfo;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    if let Some(location) = info.location() {
        defmt::error!("bench panic at {=str}:{=u32}", location.file(), location.line());
    }
    defmt::error!("{}", defmt::Display2Format(&info.message()));
    cortex_m::asm::udf();
}
