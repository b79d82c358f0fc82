use core::fmt::Write as _;

use embassy_futures::join::join;
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Timer};
use embedded_io_async::{Read, Write};
use heapless::String;
use selftest_core::console;
use selftest_core::task::BenchControl;

use crate::console::ConsoleSession;
use crate::diagnostics;
use crate::status::StatusBoard;

const CONSOLE_UART_BUFFER_SIZE: usize = 128;
const CONSOLE_UART_BAUD: u32 = 115_200;
const REPLY_QUEUE_DEPTH: usize = 4;
/// Large enough for the help text, the longest reply.
const REPLY_TEXT_LEN: usize = 384;

type ReplyText = String<REPLY_TEXT_LEN>;

static mut UART_TX_BUFFER: [u8; CONSOLE_UART_BUFFER_SIZE] = [0; CONSOLE_UART_BUFFER_SIZE];
static mut UART_RX_BUFFER: [u8; CONSOLE_UART_BUFFER_SIZE] = [0; CONSOLE_UART_BUFFER_SIZE];
static REPLY_QUEUE: Channel<ThreadModeRawMutex, ReplyText, REPLY_QUEUE_DEPTH> = Channel::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::task]
pub async fn run(
    control: &'static BenchControl,
    board: &'static StatusBoard,
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = CONSOLE_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = unsafe {
        BufferedUart::new(
            usart,
            rx_pin,
            tx_pin,
            &mut UART_TX_BUFFER,
            &mut UART_RX_BUFFER,
            UartIrqs,
            config,
        )
        .expect("failed to initialize console UART")
    };

    let (mut uart_tx, mut uart_rx) = uart.split();

    let reply_sender = REPLY_QUEUE.sender();
    let reply_receiver = REPLY_QUEUE.receiver();

    let uart_to_session = async move {
        let mut session = ConsoleSession::new(control);
        let mut ingress = [0u8; 32];
        loop {
            let count = match uart_rx.read(&mut ingress).await {
                Ok(count) => count,
                Err(_) => {
                    defmt::warn!("console: UART read error");
                    Timer::after(Duration::from_millis(5)).await;
                    continue;
                }
            };

            for &byte in &ingress[..count] {
                let mut text = ReplyText::new();
                match session.ingest(byte) {
                    Ok(Some(reply)) => {
                        let snapshot = board.snapshot();
                        if console::write_reply(&mut text, reply, &snapshot).is_err() {
                            defmt::warn!("console: reply truncated");
                        }
                    }
                    Ok(None) => continue,
                    Err(error) => {
                        let mut reason = String::<64>::new();
                        let _ = write!(reason, "{error}");
                        diagnostics::log_console_rejected(&reason);
                        let _ = write!(text, "error: {reason}\r\n");
                    }
                }
                reply_sender.send(text).await;
            }
        }
    };

    let session_to_uart = async move {
        loop {
            let text = reply_receiver.receive().await;
            if uart_tx.write_all(text.as_bytes()).await.is_err() {
                defmt::warn!("console: UART write error");
                Timer::after(Duration::from_millis(5)).await;
                continue;
            }
            if uart_tx.flush().await.is_err() {
                defmt::warn!("console: UART flush error");
            }
        }
    };

    join(uart_to_session, session_to_uart).await;
    loop {
        core::future::pending::<()>().await;
    }
}
