use crate::diagnostics::{self, DiagnosticReceiver};

/// Drains rendered telemetry lines to the RTT terminal.
#[embassy_executor::task]
pub async fn run(receiver: DiagnosticReceiver<'static>) -> ! {
    loop {
        let line = receiver.receive().await;
        diagnostics::emit_line(&line);
    }
}
