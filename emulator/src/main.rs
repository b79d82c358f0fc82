mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use selftest_core::config::BenchConfig;
use session::Session;

const USAGE: &str = "Usage: bench-emulator [--tick-ms <n>] [--transcript <path>]";

struct Options {
    config: BenchConfig,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(&options.config, options.transcript.as_deref())?;
    let mut line = String::new();

    writeln!(
        writer,
        "Bench emulator ready (tick {}ms, rc link up). Type `help` for commands or `exit` to quit.",
        options.config.tick_period.as_millis()
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<Options, String> {
    let mut options = Options {
        config: BenchConfig::DEFAULT,
        transcript: None,
    };

    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--tick-ms=") {
            options.config = options.config.with_tick_period(parse_tick(value)?);
        } else if arg == "--tick-ms" {
            let value = args.next().ok_or("Expected value after --tick-ms")?;
            options.config = options.config.with_tick_period(parse_tick(&value)?);
        } else if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--transcript" {
            let value = args.next().ok_or("Expected value after --transcript")?;
            options.transcript = Some(PathBuf::from(value));
        } else {
            return Err(format!("Unknown argument `{arg}`"));
        }
    }

    Ok(options)
}

fn parse_tick(value: &str) -> Result<Duration, String> {
    match value.parse::<u64>() {
        Ok(millis) if millis > 0 => Ok(Duration::from_millis(millis)),
        _ => Err(format!("Invalid tick period `{value}` (expected milliseconds > 0)")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|arg| (*arg).to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn defaults_to_ten_millisecond_ticks() {
        let options = parse_options(args(&[])).unwrap();
        assert_eq!(options.config.tick_period, Duration::from_millis(10));
        assert!(options.transcript.is_none());
    }

    #[test]
    fn accepts_tick_and_transcript_flags() {
        let options = parse_options(args(&["--tick-ms", "20", "--transcript=out.log"])).unwrap();
        assert_eq!(options.config.tick_period, Duration::from_millis(20));
        assert_eq!(options.transcript, Some(PathBuf::from("out.log")));

        let options = parse_options(args(&["--tick-ms=5"])).unwrap();
        assert_eq!(options.config.tick_period, Duration::from_millis(5));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse_options(args(&["--tick-ms", "0"])).is_err());
        assert!(parse_options(args(&["--tick-ms"])).is_err());
        assert!(parse_options(args(&["--verbose"])).is_err());
    }
}
