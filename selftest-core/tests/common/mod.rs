#![allow(dead_code)]

use core::ops::Add;
use core::time::Duration;

use heapless::{HistoryBuf, String, Vec as HeaplessVec};
use selftest_core::config::BenchConfig;
use selftest_core::link::SharedLinkStatus;
use selftest_core::sequencer::{ActuatorDriver, AllocationError, KinematicsSolver};
use selftest_core::sequences::{PulseWidth, PwmChannel};
use selftest_core::task::{BenchControl, BenchTask, RawSampleSource};
use selftest_core::telemetry::{DiagnosticChannel, MAX_LINE_LEN, MonotonicInstant, TimestampMillis};

pub const TICK_MS: u64 = 10;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MockInstant(u64);

impl MockInstant {
    pub fn millis(value: u64) -> Self {
        Self(value * 1_000)
    }
}

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + u64::try_from(rhs.as_micros()).unwrap())
    }
}

impl MonotonicInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    fn as_millis(&self) -> TimestampMillis {
        self.0 / 1_000
    }
}

#[derive(Default)]
pub struct RecordingActuator {
    pub commands: HeaplessVec<(PwmChannel, PulseWidth), 64>,
    pub neutral: u32,
}

impl ActuatorDriver for RecordingActuator {
    fn set_duty_cycle(&mut self, channel: PwmChannel, pulse: PulseWidth) {
        self.commands
            .push((channel, pulse))
            .expect("actuator log capacity exceeded");
    }

    fn command_neutral(&mut self) {
        self.neutral += 1;
    }
}

#[derive(Default)]
pub struct ScriptedSolver {
    pub fail: bool,
    pub calls: u32,
}

impl KinematicsSolver for ScriptedSolver {
    fn initialize_matrices(&mut self) -> Result<(), AllocationError> {
        self.calls += 1;
        if self.fail {
            Err(AllocationError::StorageUnavailable)
        } else {
            Ok(())
        }
    }
}

pub struct ScriptedSource(pub i32);

impl RawSampleSource for ScriptedSource {
    fn read_raw(&mut self) -> i32 {
        self.0
    }
}

pub type Line = String<MAX_LINE_LEN>;

/// Keeps the most recent lines plus running totals.
#[derive(Default)]
pub struct RecordingChannel {
    pub recent: HistoryBuf<Line, 32>,
    pub accepted: usize,
    pub failure_lines: usize,
    pub refuse: bool,
}

impl RecordingChannel {
    pub fn last(&self) -> Option<&str> {
        self.recent.recent().map(Line::as_str)
    }
}

impl DiagnosticChannel for RecordingChannel {
    fn write_line(&mut self, line: &str) -> bool {
        if self.refuse {
            return false;
        }
        let mut owned = Line::new();
        owned.push_str(line).expect("line fits");
        if line.starts_with("selftest-failure") {
            self.failure_lines += 1;
        }
        self.recent.write(owned);
        self.accepted += 1;
        true
    }
}

pub type TestTask<'a> = BenchTask<
    MockInstant,
    &'a SharedLinkStatus,
    RecordingActuator,
    ScriptedSolver,
    ScriptedSource,
    RecordingChannel,
>;

pub fn build_task(link: &SharedLinkStatus) -> TestTask<'_> {
    build_task_with(link, &BenchConfig::DEFAULT)
}

pub fn build_task_with<'a>(link: &'a SharedLinkStatus, config: &BenchConfig) -> TestTask<'a> {
    BenchTask::new(
        config,
        link,
        RecordingActuator::default(),
        ScriptedSolver::default(),
        ScriptedSource(0),
        RecordingChannel::default(),
    )
}

/// Ticks every [`TICK_MS`] from `from_ms` up to and including `to_ms`.
pub fn run_until(task: &mut TestTask<'_>, control: &BenchControl, from_ms: u64, to_ms: u64) {
    let mut now = from_ms;
    while now <= to_ms {
        task.tick(control, MockInstant::millis(now));
        now += TICK_MS;
    }
}
