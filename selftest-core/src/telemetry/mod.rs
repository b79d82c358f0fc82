//! Telemetry samples, diagnostic line formatting, and the structured event log.
//!
//! Every bench tick produces one [`TelemetrySample`] which the
//! [`TelemetrySink`] renders into a fixed column layout and pushes to a
//! best-effort [`DiagnosticChannel`]. Sequencer events (arming edges, phase
//! entries, failures) are kept separately in a fixed-size ring buffer so the
//! operator console can summarize recent activity without scraping text.

use core::fmt::{self, Write as _};
use core::ops::Add;
use core::time::Duration;

use heapless::{HistoryBuf, String};

use crate::sequences::SelfTestPhase;
use crate::sequencer::SelfTestFailure;

pub mod filter;

pub use filter::{LowPass, LowPassConfig, MovingAverage, SampleFilter, SamplePipeline};

/// Canonical timestamp units for telemetry lines (milliseconds since boot).
pub type TimestampMillis = u64;

/// Identifier assigned to each recorded telemetry event.
pub type EventId = u32;

/// Maximum length of a single diagnostic line, excluding the terminator.
pub const MAX_LINE_LEN: usize = 96;

/// Column header written ahead of the sample stream.
pub const TELEMETRY_HEADER: &str = " time | raw | slide_moving |  LPF";

/// Bounded line buffer used when rendering diagnostic output.
pub type TelemetryLine = String<MAX_LINE_LEN>;

/// Trait implemented by monotonic instant wrappers driving the bench task.
pub trait MonotonicInstant: Copy + Ord + Add<Duration, Output = Self> {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;

    /// Milliseconds since the monotonic epoch, used for telemetry timestamps.
    fn as_millis(&self) -> TimestampMillis;
}

/// Per-tick measurement record; built fresh every tick and never stored.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetrySample {
    pub timestamp_ms: TimestampMillis,
    pub raw: i32,
    pub stage1: i32,
    pub stage2: i32,
}

impl TelemetrySample {
    #[must_use]
    pub const fn new(timestamp_ms: TimestampMillis, raw: i32, stage1: i32, stage2: i32) -> Self {
        Self {
            timestamp_ms,
            raw,
            stage1,
            stage2,
        }
    }
}

impl fmt::Display for TelemetrySample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {} | {}",
            self.timestamp_ms, self.raw, self.stage1, self.stage2
        )
    }
}

/// Renders a sample into the `time | raw | stage1 | stage2` column layout.
pub fn format_sample_line(sample: &TelemetrySample) -> Result<TelemetryLine, fmt::Error> {
    let mut line = TelemetryLine::new();
    write!(line, "{sample}")?;
    Ok(line)
}

/// Renders a sequencer failure notice.
pub fn format_failure_line(failure: &SelfTestFailure) -> Result<TelemetryLine, fmt::Error> {
    let mut line = TelemetryLine::new();
    write!(
        line,
        "selftest-failure phase={} reason={}",
        failure.phase, failure.reason
    )?;
    Ok(line)
}

/// Renders a phase change notice.
pub fn format_transition_line(
    from: SelfTestPhase,
    to: SelfTestPhase,
) -> Result<TelemetryLine, fmt::Error> {
    let mut line = TelemetryLine::new();
    write!(line, "selftest-phase {from} -> {to}")?;
    Ok(line)
}

/// Transport for diagnostic text (RTT terminal, UART, stdout).
///
/// Implementations must not block: a full or unavailable channel returns
/// `false` and the line is discarded.
pub trait DiagnosticChannel {
    /// Attempts to queue `line` for output.
    fn write_line(&mut self, line: &str) -> bool;
}

impl<T: DiagnosticChannel + ?Sized> DiagnosticChannel for &mut T {
    fn write_line(&mut self, line: &str) -> bool {
        (**self).write_line(line)
    }
}

/// Formats telemetry and forwards it to a [`DiagnosticChannel`], counting drops.
pub struct TelemetrySink<C> {
    channel: C,
    header_interval: u32,
    header_pending: bool,
    lines_since_header: u32,
    lines_written: u32,
    lines_dropped: u32,
}

impl<C: DiagnosticChannel> TelemetrySink<C> {
    /// Creates a sink that writes the column header once, ahead of the first sample.
    pub const fn new(channel: C) -> Self {
        Self::with_header_interval(channel, 0)
    }

    /// Creates a sink that repeats the header every `interval` sample lines
    /// (`0` writes it only once).
    pub const fn with_header_interval(channel: C, interval: u32) -> Self {
        Self {
            channel,
            header_interval: interval,
            header_pending: true,
            lines_since_header: 0,
            lines_written: 0,
            lines_dropped: 0,
        }
    }

    /// Emits one sample line, preceded by the header when due.
    pub fn emit(&mut self, sample: &TelemetrySample) {
        if self.header_due() && self.write(TELEMETRY_HEADER) {
            self.header_pending = false;
            self.lines_since_header = 0;
        }

        match format_sample_line(sample) {
            Ok(line) => {
                self.write(line.as_str());
            }
            Err(_) => self.count_drop(),
        }
        self.lines_since_header = self.lines_since_header.saturating_add(1);
    }

    /// Emits a `selftest-failure` line.
    pub fn emit_failure(&mut self, failure: &SelfTestFailure) {
        match format_failure_line(failure) {
            Ok(line) => {
                self.write(line.as_str());
            }
            Err(_) => self.count_drop(),
        }
    }

    /// Emits a `selftest-phase` line.
    pub fn emit_transition(&mut self, from: SelfTestPhase, to: SelfTestPhase) {
        match format_transition_line(from, to) {
            Ok(line) => {
                self.write(line.as_str());
            }
            Err(_) => self.count_drop(),
        }
    }

    /// Total lines accepted by the channel.
    pub const fn lines_written(&self) -> u32 {
        self.lines_written
    }

    /// Total lines discarded because the channel refused them or they did not fit.
    pub const fn lines_dropped(&self) -> u32 {
        self.lines_dropped
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    fn header_due(&self) -> bool {
        self.header_pending
            || (self.header_interval > 0 && self.lines_since_header >= self.header_interval)
    }

    fn write(&mut self, line: &str) -> bool {
        if self.channel.write_line(line) {
            self.lines_written = self.lines_written.saturating_add(1);
            true
        } else {
            self.count_drop();
            false
        }
    }

    fn count_drop(&mut self) {
        self.lines_dropped = self.lines_dropped.saturating_add(1);
    }
}

/// Structured events retained in the telemetry ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    ArmingChanged(bool),
    PhaseEntered(SelfTestPhase),
    NeutralCommanded,
    SelfTestFailed(SelfTestFailure),
    LinesDropped(u32),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::ArmingChanged(true) => f.write_str("armed"),
            TelemetryEventKind::ArmingChanged(false) => f.write_str("disarmed"),
            TelemetryEventKind::PhaseEntered(phase) => write!(f, "phase {phase}"),
            TelemetryEventKind::NeutralCommanded => f.write_str("neutral"),
            TelemetryEventKind::SelfTestFailed(failure) => {
                write!(f, "failure {} {}", failure.phase, failure.reason)
            }
            TelemetryEventKind::LinesDropped(count) => write!(f, "dropped {count}"),
        }
    }
}

/// Total number of telemetry events retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp_ms: TimestampMillis,
    pub event: TelemetryEventKind,
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
    failures: u32,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
            failures: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Number of self-test failures recorded since boot, including evicted ones.
    pub const fn failure_count(&self) -> u32 {
        self.failures
    }

    /// Records an event and returns its identifier.
    pub fn record(&mut self, event: TelemetryEventKind, timestamp_ms: TimestampMillis) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        if matches!(event, TelemetryEventKind::SelfTestFailed(_)) {
            self.failures = self.failures.saturating_add(1);
        }

        self.ring.write(TelemetryRecord {
            id,
            timestamp_ms,
            event,
        });

        id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
