//! UART operator console session.
//!
//! Bytes arrive one at a time from the console UART. The session assembles
//! them into lines, parses each with the shared `selftest-core` grammar, and
//! applies the command to the [`BenchControl`] block.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt;
use core::str;

use heapless::Vec;
use selftest_core::console::{self, ConsoleError, ConsoleReply, MAX_COMMAND_LEN};
use selftest_core::task::BenchControl;

/// Errors surfaced while assembling or applying a console line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// Input exceeded [`MAX_COMMAND_LEN`]; the rest of the line is discarded.
    LineOverflow,
    InvalidUtf8,
    Command(ConsoleError),
}

impl From<ConsoleError> for SessionError {
    fn from(error: ConsoleError) -> Self {
        Self::Command(error)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::LineOverflow => {
                write!(f, "line exceeds {MAX_COMMAND_LEN} bytes")
            }
            SessionError::InvalidUtf8 => f.write_str("line is not valid UTF-8"),
            SessionError::Command(error) => fmt::Display::fmt(error, f),
        }
    }
}

/// Line assembler bound to the operator control block.
pub struct ConsoleSession<'a> {
    control: &'a BenchControl,
    buffer: Vec<u8, MAX_COMMAND_LEN>,
    discarding: bool,
}

impl<'a> ConsoleSession<'a> {
    pub const fn new(control: &'a BenchControl) -> Self {
        Self {
            control,
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Feeds a single byte into the session. A line terminator parses and applies the line.
    pub fn ingest(&mut self, byte: u8) -> Result<Option<ConsoleReply>, SessionError> {
        match byte {
            b'\r' | b'\n' => {
                if self.discarding {
                    self.discarding = false;
                    self.buffer.clear();
                    return Ok(None);
                }
                self.process_line()
            }
            0x08 | 0x7f => {
                self.buffer.pop();
                Ok(None)
            }
            _ if self.discarding => Ok(None),
            value => {
                if self.buffer.push(value).is_err() {
                    self.discarding = true;
                    self.buffer.clear();
                    return Err(SessionError::LineOverflow);
                }
                Ok(None)
            }
        }
    }

    fn process_line(&mut self) -> Result<Option<ConsoleReply>, SessionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let result = str::from_utf8(self.buffer.as_slice())
            .map_err(|_| SessionError::InvalidUtf8)
            .and_then(|line| match console::parse_command(line) {
                Ok(command) => Ok(Some(console::execute(command, self.control))),
                Err(ConsoleError::Empty) => Ok(None),
                Err(error) => Err(error.into()),
            });
        self.buffer.clear();
        result
    }
}
