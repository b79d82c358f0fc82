use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use selftest_core::config::BenchConfig;
use selftest_core::link::SharedLinkStatus;
use selftest_core::task::{BenchControl, BenchTask};
use static_cell::StaticCell;

use crate::bench::FirmwareInstant;
use crate::diagnostics::{self, DiagnosticQueue, QueuedDiagnostics};
use crate::hw::pwm::PwmActuator;
use crate::hw::sensor::AdcSampleSource;
use crate::kinematics::{KinematicsStorage, StaticKinematics};
use crate::status::StatusBoard;

mod bench_task;
mod console_task;
mod diag_task;
mod rc_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

/// Bench task wired to the board peripherals.
pub(super) type FirmwareBenchTask = BenchTask<
    FirmwareInstant,
    &'static SharedLinkStatus,
    PwmActuator<'static>,
    StaticKinematics,
    AdcSampleSource<'static>,
    QueuedDiagnostics<'static>,
>;

pub(super) static BENCH_CONTROL: BenchControl = BenchControl::new();
pub(super) static RC_LINK: SharedLinkStatus = SharedLinkStatus::new();
pub(super) static DIAG_QUEUE: DiagnosticQueue = DiagnosticQueue::new();
pub(super) static STATUS_BOARD: StatusBoard = StatusBoard::new();
static KINEMATICS_STORAGE: KinematicsStorage = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA6,
        PB0,
        PB1,
        PB5,
        TIM3,
        ADC1,
        USART5,
        ..
    } = hal::init(config);

    let bench_config = BenchConfig::DEFAULT;
    let task: FirmwareBenchTask = BenchTask::new(
        &bench_config,
        &RC_LINK,
        PwmActuator::new(TIM3, PA6),
        StaticKinematics::new(&KINEMATICS_STORAGE),
        AdcSampleSource::new(ADC1, PA0),
        QueuedDiagnostics::new(DIAG_QUEUE.sender()),
    );
    let tick_ms = u64::try_from(bench_config.tick_period.as_millis()).unwrap_or(u64::MAX);
    diagnostics::log_boot(tick_ms);

    spawner
        .spawn(diag_task::run(DIAG_QUEUE.receiver()))
        .expect("failed to spawn diagnostics task");

    spawner
        .spawn(rc_task::run(PB5, &RC_LINK))
        .expect("failed to spawn rc link task");

    spawner
        .spawn(bench_task::run(task, &BENCH_CONTROL, &STATUS_BOARD))
        .expect("failed to spawn bench task");

    spawner
        .spawn(console_task::run(
            &BENCH_CONTROL,
            &STATUS_BOARD,
            USART5,
            PB0,
            PB1,
        ))
        .expect("failed to spawn console task");

    core::future::pending::<()>().await;
}
