//! Status surface for the console `status` command.
//!
//! [`StatusSnapshot`] is captured by `BenchTask::status`; [`StatusFormatter`]
//! keeps the textual rendering identical on the UART console and the
//! emulator.

use core::fmt;
use core::time::Duration;

use crate::link::LinkStatus;
use crate::sequences::SelfTestPhase;
use crate::telemetry::TelemetrySample;

/// Point-in-time view of the bench task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub test_mode_requested: bool,
    /// Link state observed on the most recent tick.
    pub link: LinkStatus,
    pub armed: bool,
    pub phase: SelfTestPhase,
    /// Time since the current phase was entered; `None` before the first transition.
    pub phase_elapsed: Option<Duration>,
    pub sweep_step: Option<usize>,
    pub runs_completed: u32,
    pub failures: u32,
    pub lines_written: u32,
    pub lines_dropped: u32,
    pub last_sample: Option<TelemetrySample>,
}

impl StatusSnapshot {
    /// Snapshot reported before the bench task has ticked.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            test_mode_requested: false,
            link: LinkStatus::Connected,
            armed: false,
            phase: SelfTestPhase::Idle,
            phase_elapsed: None,
            sweep_step: None,
            runs_completed: 0,
            failures: 0,
            lines_written: 0,
            lines_dropped: 0,
            last_sample: None,
        }
    }
}

/// Renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the arming line (e.g. `arming test=on link=disconnected armed=yes`).
    pub fn write_arming_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "arming test={} link={} armed={}",
            on_off(self.snapshot.test_mode_requested),
            self.snapshot.link,
            if self.snapshot.armed { "yes" } else { "no" }
        )
    }

    /// Writes the phase line (e.g. `phase actuator-sweep step=2 elapsed=+500ms runs=0 failures=0`).
    pub fn write_phase_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(writer, "phase {}", self.snapshot.phase)?;

        if let Some(step) = self.snapshot.sweep_step {
            write!(writer, " step={step}")?;
        }

        writer.write_str(" elapsed=")?;
        write_duration(writer, self.snapshot.phase_elapsed)?;

        write!(
            writer,
            " runs={} failures={}",
            self.snapshot.runs_completed, self.snapshot.failures
        )
    }

    /// Writes the telemetry line (e.g. `telemetry written=12 dropped=0 last=100 | 5 | 4 | 3`).
    pub fn write_telemetry_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        write!(
            writer,
            "telemetry written={} dropped={} last=",
            self.snapshot.lines_written, self.snapshot.lines_dropped
        )?;
        match self.snapshot.last_sample {
            Some(sample) => write!(writer, "{sample}"),
            None => writer.write_str("n/a"),
        }
    }

    /// Writes every status line, each terminated by `\r\n`.
    pub fn write_all<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        self.write_arming_line(writer)?;
        writer.write_str("\r\n")?;
        self.write_phase_line(writer)?;
        writer.write_str("\r\n")?;
        self.write_telemetry_line(writer)?;
        writer.write_str("\r\n")
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Option<Duration>) -> fmt::Result {
    match duration {
        None => writer.write_str("n/a"),
        Some(value) if value >= Duration::from_secs(1) => {
            let millis = value.as_millis();
            let seconds = millis / 1_000;
            let tenths = (millis % 1_000) / 100;
            write!(writer, "+{seconds}.{tenths}s")
        }
        Some(value) => write!(writer, "+{}ms", value.as_millis()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    #[test]
    fn unknown_snapshot_renders_placeholders() {
        let snapshot = StatusSnapshot::unknown();
        let formatter = StatusFormatter::new(&snapshot);

        let mut line = String::<96>::new();
        formatter.write_arming_line(&mut line).unwrap();
        assert_eq!(line.as_str(), "arming test=off link=connected armed=no");

        line.clear();
        formatter.write_phase_line(&mut line).unwrap();
        assert_eq!(line.as_str(), "phase idle elapsed=n/a runs=0 failures=0");

        line.clear();
        formatter.write_telemetry_line(&mut line).unwrap();
        assert_eq!(line.as_str(), "telemetry written=0 dropped=0 last=n/a");
    }

    #[test]
    fn active_snapshot_reports_step_and_elapsed() {
        let snapshot = StatusSnapshot {
            test_mode_requested: true,
            link: LinkStatus::Disconnected,
            armed: true,
            phase: SelfTestPhase::ActuatorSweep,
            phase_elapsed: Some(Duration::from_millis(1_340)),
            sweep_step: Some(2),
            runs_completed: 1,
            failures: 0,
            lines_written: 12,
            lines_dropped: 1,
            last_sample: Some(TelemetrySample::new(100, 5, 4, 3)),
        };
        let formatter = StatusFormatter::new(&snapshot);

        let mut out = String::<256>::new();
        formatter.write_all(&mut out).unwrap();

        let mut lines = out.split("\r\n");
        assert_eq!(
            lines.next(),
            Some("arming test=on link=disconnected armed=yes")
        );
        assert_eq!(
            lines.next(),
            Some("phase actuator-sweep step=2 elapsed=+1.3s runs=1 failures=0")
        );
        assert_eq!(
            lines.next(),
            Some("telemetry written=12 dropped=1 last=100 | 5 | 4 | 3")
        );
    }
}
