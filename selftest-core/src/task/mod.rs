//! Periodic bench task tying the arbiter, sequencer, and telemetry together.
//!
//! The firmware and the emulator own the scheduling loop. Each period they
//! call [`BenchTask::tick`], which samples the operator flag and the link,
//! evaluates the arming decision, steps the sequencer once, and emits one
//! telemetry line. Nothing in `tick` blocks or allocates.

use core::time::Duration;

use portable_atomic::{AtomicBool, Ordering};

use crate::arbiter::{self, Armed};
use crate::config::BenchConfig;
use crate::console::StatusSnapshot;
use crate::link::{LinkMonitor, LinkStatus, LinkStatusSource};
use crate::sequencer::{ActuatorDriver, KinematicsSolver, SelfTestSequencer, StepReport};
use crate::telemetry::{
    DiagnosticChannel, MonotonicInstant, SamplePipeline, TelemetryEventKind, TelemetryRecorder,
    TelemetrySample, TelemetrySink,
};

/// Operator-owned control cells read by the bench task.
///
/// Lives in a `static` for the whole process. The console writes, the bench
/// task reads; both sides use relaxed single-word atomics.
pub struct BenchControl {
    test_mode: AtomicBool,
    reset: AtomicBool,
}

impl BenchControl {
    /// Test mode off, no reset pending.
    pub const fn new() -> Self {
        Self {
            test_mode: AtomicBool::new(false),
            reset: AtomicBool::new(false),
        }
    }

    pub fn set_test_mode(&self, enabled: bool) {
        self.test_mode.store(enabled, Ordering::Relaxed);
    }

    pub fn test_mode_requested(&self) -> bool {
        self.test_mode.load(Ordering::Relaxed)
    }

    /// Asks the sequencer to abandon its current run on the next tick.
    pub fn request_reset(&self) {
        self.reset.store(true, Ordering::Relaxed);
    }

    pub fn reset_requested(&self) -> bool {
        self.reset.load(Ordering::Relaxed)
    }

    /// Consumes a pending reset request.
    pub fn take_reset(&self) -> bool {
        self.reset.swap(false, Ordering::Relaxed)
    }
}

impl Default for BenchControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of the raw reading reported in each telemetry line.
pub trait RawSampleSource {
    fn read_raw(&mut self) -> i32;
}

impl<T: RawSampleSource + ?Sized> RawSampleSource for &mut T {
    fn read_raw(&mut self) -> i32 {
        (**self).read_raw()
    }
}

/// Bench scheduler binding.
pub struct BenchTask<I, S, A, K, R, C> {
    link: LinkMonitor<S>,
    sequencer: SelfTestSequencer<I, A, K>,
    samples: R,
    pipeline: SamplePipeline,
    sink: TelemetrySink<C>,
    events: TelemetryRecorder,
    tick_period: Duration,
    last_armed: Armed,
    last_link: LinkStatus,
    last_sample: Option<TelemetrySample>,
    phase_entered_at: Option<I>,
    reported_drops: u32,
    ticks: u32,
}

impl<I, S, A, K, R, C> BenchTask<I, S, A, K, R, C>
where
    I: MonotonicInstant,
    S: LinkStatusSource,
    A: ActuatorDriver,
    K: KinematicsSolver,
    R: RawSampleSource,
    C: DiagnosticChannel,
{
    /// Assembles the task. The sequencer drives the actuator to neutral here.
    pub fn new(
        config: &BenchConfig,
        link: S,
        actuator: A,
        solver: K,
        samples: R,
        channel: C,
    ) -> Self {
        let link = LinkMonitor::new(link);
        let last_link = link.read();

        Self {
            link,
            sequencer: SelfTestSequencer::new(config.sweep, actuator, solver),
            samples,
            pipeline: SamplePipeline::new(config.lowpass),
            sink: TelemetrySink::with_header_interval(channel, config.header_interval),
            events: TelemetryRecorder::new(),
            tick_period: config.tick_period,
            last_armed: arbiter::evaluate(false, last_link),
            last_link,
            last_sample: None,
            phase_entered_at: None,
            reported_drops: 0,
            ticks: 0,
        }
    }

    /// Runs one scheduling period.
    pub fn tick(&mut self, control: &BenchControl, now: I) -> StepReport {
        let timestamp_ms = now.as_millis();
        self.ticks = self.ticks.wrapping_add(1);

        let request = control.test_mode_requested();
        let link = self.link.read();
        let armed = arbiter::evaluate(request, link);
        self.last_link = link;

        if control.take_reset() {
            self.sequencer.request_reset();
        }

        if armed != self.last_armed {
            self.events.record(TelemetryEventKind::ArmingChanged(armed.is_armed()), timestamp_ms);
            self.last_armed = armed;
        }

        let report = self.sequencer.step(armed, now);

        if report.neutral_issued {
            self.events.record(TelemetryEventKind::NeutralCommanded, timestamp_ms);
        }
        if let Some(failure) = report.failure {
            self.events.record(TelemetryEventKind::SelfTestFailed(failure), timestamp_ms);
            self.sink.emit_failure(&failure);
        }
        if let Some(transition) = report.transition {
            self.events.record(TelemetryEventKind::PhaseEntered(transition.to), timestamp_ms);
            self.sink.emit_transition(transition.from, transition.to);
            self.phase_entered_at = Some(now);
        }

        let raw = self.samples.read_raw();
        let sample = self.pipeline.sample(timestamp_ms, raw);
        self.sink.emit(&sample);
        self.last_sample = Some(sample);

        let dropped = self.sink.lines_dropped();
        if dropped != self.reported_drops {
            self.events.record(
                TelemetryEventKind::LinesDropped(dropped.wrapping_sub(self.reported_drops)),
                timestamp_ms,
            );
            self.reported_drops = dropped;
        }

        report
    }

    /// Captures the state shown by the console `status` command.
    pub fn status(&self, control: &BenchControl, now: I) -> StatusSnapshot {
        StatusSnapshot {
            test_mode_requested: control.test_mode_requested(),
            link: self.last_link,
            armed: self.last_armed.is_armed(),
            phase: self.sequencer.phase(),
            phase_elapsed: self
                .phase_entered_at
                .map(|entered| now.saturating_duration_since(entered)),
            sweep_step: self.sequencer.step_index(),
            runs_completed: self.sequencer.runs_completed(),
            failures: self.events.failure_count(),
            lines_written: self.sink.lines_written(),
            lines_dropped: self.sink.lines_dropped(),
            last_sample: self.last_sample,
        }
    }

    pub const fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// Number of completed `tick` calls (wrapping).
    pub const fn ticks(&self) -> u32 {
        self.ticks
    }

    pub const fn last_sample(&self) -> Option<TelemetrySample> {
        self.last_sample
    }

    pub fn sequencer(&self) -> &SelfTestSequencer<I, A, K> {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut SelfTestSequencer<I, A, K> {
        &mut self.sequencer
    }

    pub fn sink(&self) -> &TelemetrySink<C> {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut TelemetrySink<C> {
        &mut self.sink
    }

    pub fn events(&self) -> &TelemetryRecorder {
        &self.events
    }

    pub fn link(&self) -> &LinkMonitor<S> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut LinkMonitor<S> {
        &mut self.link
    }

    pub fn samples(&self) -> &R {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut R {
        &mut self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_starts_disabled() {
        let control = BenchControl::new();
        assert!(!control.test_mode_requested());
        assert!(!control.reset_requested());
    }

    #[test]
    fn reset_request_is_consumed_once() {
        let control = BenchControl::new();
        control.request_reset();
        assert!(control.reset_requested());
        assert!(control.take_reset());
        assert!(!control.take_reset());
    }

    #[test]
    fn test_mode_flag_toggles() {
        let control = BenchControl::default();
        control.set_test_mode(true);
        assert!(control.test_mode_requested());
        control.set_test_mode(false);
        assert!(!control.test_mode_requested());
    }
}
