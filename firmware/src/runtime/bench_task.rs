use embassy_time::Ticker;
use selftest_core::task::BenchControl;

use super::FirmwareBenchTask;
use crate::bench::{FirmwareInstant, to_embassy_duration};
use crate::status::StatusBoard;

#[embassy_executor::task]
pub async fn run(
    mut task: FirmwareBenchTask,
    control: &'static BenchControl,
    board: &'static StatusBoard,
) -> ! {
    let mut ticker = Ticker::every(to_embassy_duration(task.tick_period()));
    loop {
        let now = FirmwareInstant::now();
        task.tick(control, now);
        board.publish(task.status(control, now));
        ticker.next().await;
    }
}
