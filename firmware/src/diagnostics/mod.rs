//! Diagnostic line queue and logging helpers.
//!
//! The bench task renders telemetry into fixed-size lines and pushes them into
//! [`DiagnosticQueue`] without waiting. A separate task drains the queue into
//! the RTT terminal, so a slow debug probe only ever costs dropped lines.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use selftest_core::link::LinkStatus;
use selftest_core::telemetry::{DiagnosticChannel, TelemetryLine};

/// Lines buffered between the bench task and the RTT drain task.
pub const DIAG_QUEUE_DEPTH: usize = 16;

#[cfg(target_os = "none")]
type DiagMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type DiagMutex = NoopRawMutex;

/// Queue carrying rendered diagnostic lines.
pub type DiagnosticQueue = Channel<DiagMutex, TelemetryLine, DIAG_QUEUE_DEPTH>;

pub type DiagnosticSender<'a> = Sender<'a, DiagMutex, TelemetryLine, DIAG_QUEUE_DEPTH>;

pub type DiagnosticReceiver<'a> = Receiver<'a, DiagMutex, TelemetryLine, DIAG_QUEUE_DEPTH>;

/// [`DiagnosticChannel`] backed by the diagnostic queue.
pub struct QueuedDiagnostics<'a> {
    sender: DiagnosticSender<'a>,
}

impl<'a> QueuedDiagnostics<'a> {
    pub fn new(sender: DiagnosticSender<'a>) -> Self {
        Self { sender }
    }
}

impl DiagnosticChannel for QueuedDiagnostics<'_> {
    fn write_line(&mut self, line: &str) -> bool {
        let mut owned = TelemetryLine::new();
        if owned.push_str(line).is_err() {
            return false;
        }
        self.sender.try_send(owned).is_ok()
    }
}

#[cfg(target_os = "none")]
pub fn emit_line(line: &str) {
    defmt::println!("{=str}", line);
}

#[cfg(not(target_os = "none"))]
pub fn emit_line(line: &str) {
    println!("{line}");
}

#[cfg(target_os = "none")]
pub fn log_boot(tick_ms: u64) {
    defmt::info!("bench: controller up, tick={}ms test-mode=off", tick_ms);
}

#[cfg(not(target_os = "none"))]
pub fn log_boot(tick_ms: u64) {
    println!("bench: controller up, tick={tick_ms}ms test-mode=off");
}

#[cfg(target_os = "none")]
pub fn log_link_change(status: LinkStatus) {
    defmt::info!("rc-link: {=str}", status.label());
}

#[cfg(not(target_os = "none"))]
pub fn log_link_change(status: LinkStatus) {
    println!("rc-link: {}", status.label());
}

#[cfg(target_os = "none")]
pub fn log_console_rejected(reason: &str) {
    defmt::warn!("console: rejected line ({=str})", reason);
}

#[cfg(not(target_os = "none"))]
pub fn log_console_rejected(reason: &str) {
    println!("console: rejected line ({reason})");
}

#[cfg(target_os = "none")]
pub fn log_kinematics_init(initializations: u32, first: bool) {
    if first {
        defmt::info!("kinematics: matrix storage allocated");
    } else {
        defmt::info!("kinematics: matrices reset (init #{})", initializations);
    }
}

#[cfg(not(target_os = "none"))]
pub fn log_kinematics_init(initializations: u32, first: bool) {
    if first {
        println!("kinematics: matrix storage allocated");
    } else {
        println!("kinematics: matrices reset (init #{initializations})");
    }
}
