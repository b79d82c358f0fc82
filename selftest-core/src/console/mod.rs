//! Operator console grammar shared by the firmware UART and the emulator.
//!
//! The console is the only writer of [`BenchControl`]. Lines are parsed with
//! `winnow` into a [`ConsoleCommand`], applied with [`execute`], and the
//! caller renders the resulting [`ConsoleReply`].

use core::fmt;

use winnow::ascii::{Caseless, space0, space1};
use winnow::combinator::{alt, delimited, preceded};
use winnow::prelude::*;

use crate::task::BenchControl;

pub mod status;

pub use status::{StatusFormatter, StatusSnapshot};

/// Longest console line accepted, excluding the terminator.
pub const MAX_COMMAND_LEN: usize = 64;

/// Help text, one entry per line.
pub const HELP_LINES: [&str; 5] = [
    "test on     allow the self-test to arm when the rc link is down",
    "test off    disarm and return the actuators to neutral",
    "test reset  abandon the current run and return to idle",
    "status      show arming, phase, and telemetry counters",
    "help        show this list",
];

/// Commands understood by the console.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleCommand {
    TestMode(bool),
    Reset,
    Status,
    Help,
}

/// Reasons a console line was rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleError {
    Empty,
    TooLong,
    UnknownCommand,
    /// `test` was given a missing or unknown argument.
    InvalidArgument,
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::Empty => f.write_str("empty line"),
            ConsoleError::TooLong => write!(f, "line exceeds {MAX_COMMAND_LEN} bytes"),
            ConsoleError::UnknownCommand => f.write_str("unknown command (try `help`)"),
            ConsoleError::InvalidArgument => f.write_str("usage: test on|off|reset"),
        }
    }
}

/// Outcome of applying a command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleReply {
    /// Control cells updated; the message acknowledges the change.
    Ack(&'static str),
    /// Caller should render a status snapshot.
    Status,
    /// Caller should print [`HELP_LINES`].
    Help,
}

/// Parses a single console line. Surrounding whitespace and line endings are ignored.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ConsoleError::Empty);
    }
    if line.len() > MAX_COMMAND_LEN {
        return Err(ConsoleError::TooLong);
    }

    command.parse(line).map_err(|_| {
        let keyword = line.split_whitespace().next().unwrap_or_default();
        if keyword.eq_ignore_ascii_case("test") {
            ConsoleError::InvalidArgument
        } else {
            ConsoleError::UnknownCommand
        }
    })
}

/// Applies `command` to the operator control block.
pub fn execute(command: ConsoleCommand, control: &BenchControl) -> ConsoleReply {
    match command {
        ConsoleCommand::TestMode(true) => {
            control.set_test_mode(true);
            ConsoleReply::Ack("test mode on")
        }
        ConsoleCommand::TestMode(false) => {
            control.set_test_mode(false);
            ConsoleReply::Ack("test mode off")
        }
        ConsoleCommand::Reset => {
            control.request_reset();
            ConsoleReply::Ack("reset requested")
        }
        ConsoleCommand::Status => ConsoleReply::Status,
        ConsoleCommand::Help => ConsoleReply::Help,
    }
}

/// Writes [`HELP_LINES`] separated by `\r\n`.
pub fn write_help<W: fmt::Write>(writer: &mut W) -> fmt::Result {
    for line in HELP_LINES {
        writer.write_str(line)?;
        writer.write_str("\r\n")?;
    }
    Ok(())
}

/// Renders `reply`, using `snapshot` for [`ConsoleReply::Status`].
pub fn write_reply<W: fmt::Write>(
    writer: &mut W,
    reply: ConsoleReply,
    snapshot: &StatusSnapshot,
) -> fmt::Result {
    match reply {
        ConsoleReply::Ack(message) => {
            writer.write_str(message)?;
            writer.write_str("\r\n")
        }
        ConsoleReply::Status => StatusFormatter::new(snapshot).write_all(writer),
        ConsoleReply::Help => write_help(writer),
    }
}

fn command(input: &mut &str) -> ModalResult<ConsoleCommand> {
    delimited(
        space0,
        alt((
            test_command,
            Caseless("status").value(ConsoleCommand::Status),
            alt((Caseless("help"), "?")).value(ConsoleCommand::Help),
        )),
        space0,
    )
    .parse_next(input)
}

fn test_command(input: &mut &str) -> ModalResult<ConsoleCommand> {
    preceded(
        (Caseless("test"), space1),
        alt((
            Caseless("on").value(ConsoleCommand::TestMode(true)),
            Caseless("off").value(ConsoleCommand::TestMode(false)),
            Caseless("reset").value(ConsoleCommand::Reset),
        )),
    )
    .parse_next(input)
}
