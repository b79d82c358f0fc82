use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::ops::Add;
use std::path::Path;
use std::time::Duration;

use selftest_core::config::BenchConfig;
use selftest_core::console::{self, ConsoleReply};
use selftest_core::link::LinkStatus;
use selftest_core::sequencer::{ActuatorDriver, AllocationError, KinematicsSolver};
use selftest_core::sequences::{PulseWidth, PwmChannel};
use selftest_core::task::{BenchControl, BenchTask, RawSampleSource};
use selftest_core::telemetry::{DiagnosticChannel, MonotonicInstant, TimestampMillis};

/// Upper bound on `tick <n>` so a typo cannot stall the session.
pub const MAX_TICKS_PER_COMMAND: u32 = 60_000;

pub const HOST_HELP_LINES: &[&str] = &[
    "link up|down  simulate the rc receiver gaining or losing its link",
    "tick [n]      advance the bench task by n scheduling periods (default 1)",
    "raw <value>   set the raw sensor reading fed to telemetry",
    "alloc fail|ok make the kinematics matrix allocation fail or succeed",
    "exit          close the emulator",
];

/// Emulated monotonic clock, in microseconds since session start.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct HostInstant(u64);

impl HostInstant {
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub fn elapsed_since_start(self) -> Duration {
        Duration::from_micros(self.0)
    }
}

impl Add<Duration> for HostInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let micros = u64::try_from(rhs.as_micros()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(micros))
    }
}

impl MonotonicInstant for HostInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    fn as_millis(&self) -> TimestampMillis {
        self.0 / 1_000
    }
}

/// Actuator that narrates every command it receives.
#[derive(Default)]
pub struct NarratingActuator {
    pending: Vec<String>,
}

impl ActuatorDriver for NarratingActuator {
    fn set_duty_cycle(&mut self, channel: PwmChannel, pulse: PulseWidth) {
        self.pending.push(format!("pwm {channel} <- {pulse}"));
    }

    fn command_neutral(&mut self) {
        self.pending.push("pwm neutral".to_string());
    }
}

/// Kinematics solver whose allocation outcome is chosen by the operator.
#[derive(Default)]
pub struct SwitchableSolver {
    fail: bool,
}

impl KinematicsSolver for SwitchableSolver {
    fn initialize_matrices(&mut self) -> Result<(), AllocationError> {
        if self.fail {
            Err(AllocationError::StorageUnavailable)
        } else {
            Ok(())
        }
    }
}

#[derive(Default)]
pub struct SimulatedSensor {
    value: i32,
}

impl RawSampleSource for SimulatedSensor {
    fn read_raw(&mut self) -> i32 {
        self.value
    }
}

/// Diagnostic channel that buffers lines until the session prints them.
#[derive(Default)]
pub struct CapturedChannel {
    lines: Vec<String>,
}

impl DiagnosticChannel for CapturedChannel {
    fn write_line(&mut self, line: &str) -> bool {
        self.lines.push(line.to_string());
        true
    }
}

type HostBenchTask = BenchTask<
    HostInstant,
    LinkStatus,
    NarratingActuator,
    SwitchableSolver,
    SimulatedSensor,
    CapturedChannel,
>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum HostCommand {
    Link(LinkStatus),
    Tick(u32),
    Raw(i32),
    Alloc { fail: bool },
}

pub struct Session {
    control: BenchControl,
    task: HostBenchTask,
    now: HostInstant,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    /// Starts a session with the rc link connected, as on a powered-up vehicle.
    pub fn new(config: &BenchConfig, transcript: Option<&Path>) -> io::Result<Self> {
        let transcript = transcript.map(TranscriptLogger::new).transpose()?;
        let task = BenchTask::new(
            config,
            LinkStatus::Connected,
            NarratingActuator::default(),
            SwitchableSolver::default(),
            SimulatedSensor::default(),
            CapturedChannel::default(),
        );

        let mut session = Self {
            control: BenchControl::new(),
            task,
            now: HostInstant::default(),
            transcript,
        };
        let boot = session.drain_output();
        session.record_output(&boot)?;
        Ok(session)
    }

    pub fn now(&self) -> HostInstant {
        self.now
    }

    pub fn control(&self) -> &BenchControl {
        &self.control
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.record(TranscriptRole::Host, trimmed)?;

        let lines = match parse_host_command(trimmed) {
            Some(Ok(command)) => self.apply_host_command(command),
            Some(Err(usage)) => vec![format!("ERR {usage}")],
            None => self.handle_console_line(trimmed),
        };

        self.record_output(&lines)?;
        Ok(lines)
    }

    fn handle_console_line(&mut self, line: &str) -> Vec<String> {
        let command = match console::parse_command(line) {
            Ok(command) => command,
            Err(error) => return vec![format!("ERR {error}")],
        };

        let reply = console::execute(command, &self.control);
        let snapshot = self.task.status(&self.control, self.now);
        let mut text = String::new();
        if console::write_reply(&mut text, reply, &snapshot).is_err() {
            return vec!["ERR failed to render reply".to_string()];
        }

        let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
        if reply == ConsoleReply::Help {
            lines.extend(HOST_HELP_LINES.iter().map(|line| (*line).to_string()));
        }
        lines
    }

    fn apply_host_command(&mut self, command: HostCommand) -> Vec<String> {
        match command {
            HostCommand::Link(status) => {
                *self.task.link_mut().source_mut() = status;
                vec![format!("rc link {status}")]
            }
            HostCommand::Raw(value) => {
                self.task.samples_mut().value = value;
                vec![format!("raw sample {value}")]
            }
            HostCommand::Alloc { fail } => {
                self.task.sequencer_mut().solver_mut().fail = fail;
                let outcome = if fail { "fail" } else { "succeed" };
                vec![format!("kinematics allocation will {outcome}")]
            }
            HostCommand::Tick(count) => self.run_ticks(count),
        }
    }

    fn run_ticks(&mut self, count: u32) -> Vec<String> {
        let mut lines = Vec::new();
        for _ in 0..count {
            self.task.tick(&self.control, self.now);
            lines.extend(self.drain_output());
            self.now = self.now + self.task.tick_period();
        }

        let sequencer = self.task.sequencer();
        let mut summary = format!("t=+{}ms phase {}", self.now.as_millis(), sequencer.phase());
        if let Some(step) = sequencer.step_index() {
            let _ = write!(summary, " step={step}");
        }
        lines.push(summary);
        lines
    }

    fn drain_output(&mut self) -> Vec<String> {
        let mut lines = std::mem::take(&mut self.task.sequencer_mut().actuator_mut().pending);
        lines.append(&mut self.task.sink_mut().channel_mut().lines);
        lines
    }

    fn record(&mut self, role: TranscriptRole, line: &str) -> io::Result<()> {
        let elapsed = self.now.elapsed_since_start();
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(elapsed, role, line),
            None => Ok(()),
        }
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.record(TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn parse_host_command(line: &str) -> Option<Result<HostCommand, &'static str>> {
    let mut words = line.split_whitespace();
    let keyword = words.next()?.to_ascii_lowercase();
    let argument = words.next();
    let trailing = words.next().is_some();

    let (parsed, usage) = match keyword.as_str() {
        "link" => (
            match argument {
                Some(word) if word.eq_ignore_ascii_case("up") => {
                    Some(HostCommand::Link(LinkStatus::Connected))
                }
                Some(word) if word.eq_ignore_ascii_case("down") => {
                    Some(HostCommand::Link(LinkStatus::Disconnected))
                }
                _ => None,
            },
            "usage: link up|down",
        ),
        "tick" => (
            match argument {
                None => Some(HostCommand::Tick(1)),
                Some(word) => word
                    .parse::<u32>()
                    .ok()
                    .filter(|count| (1..=MAX_TICKS_PER_COMMAND).contains(count))
                    .map(HostCommand::Tick),
            },
            "usage: tick [1-60000]",
        ),
        "raw" => (
            argument
                .and_then(|word| word.parse::<i32>().ok())
                .map(HostCommand::Raw),
            "usage: raw <value>",
        ),
        "alloc" => (
            match argument {
                Some(word) if word.eq_ignore_ascii_case("fail") => {
                    Some(HostCommand::Alloc { fail: true })
                }
                Some(word) if word.eq_ignore_ascii_case("ok") => {
                    Some(HostCommand::Alloc { fail: false })
                }
                _ => None,
            },
            "usage: alloc fail|ok",
        ),
        _ => return None,
    };

    Some(match parsed {
        Some(command) if !trailing => Ok(command),
        _ => Err(usage),
    })
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header()?;
        Ok(logger)
    }

    fn write_header(&mut self) -> io::Result<()> {
        writeln!(self.writer, "# Bench emulator transcript")?;
        writeln!(
            self.writer,
            "# Timestamps are emulated milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
