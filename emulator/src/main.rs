mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use monitor_core::config::MonitorConfig;
use session::Session;

const TRANSCRIPT_HEADER: &str = "Voltage Monitor Emulator transcript";

fn main() -> io::Result<()> {
    let transcript = parse_transcript_path().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: monitor-emulator [--transcript <path>]");
        process::exit(2);
    });

    let mut session = match transcript {
        Some(path) => Session::with_transcript(MonitorConfig::default(), &path, TRANSCRIPT_HEADER)?,
        None => Session::new(MonitorConfig::default()),
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    run(&mut session, stdin.lock(), stdout.lock())
}

/// Feeds console lines from `reader` to `session` until EOF or `exit`.
fn run<R: BufRead, W: Write>(
    session: &mut Session,
    mut reader: R,
    mut writer: W,
) -> io::Result<()> {
    writeln!(
        writer,
        "Voltage Monitor Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    let mut line = String::new();
    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        if reader.read_line(&mut line)? == 0 {
            writeln!(writer)?;
            return Ok(());
        }

        match line.trim() {
            "" => {}
            command if should_terminate(command) => {
                writeln!(
                    writer,
                    "Session closed. sessions={} reported={}",
                    session.monitor().session(),
                    session.reports()
                )?;
                return Ok(());
            }
            command => {
                for response in session.handle_command(command)? {
                    writeln!(writer, "{response}")?;
                }
            }
        }
    }
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_transcript_path() -> Result<Option<PathBuf>, String> {
    let mut args = env::args().skip(1);
    let Some(arg) = args.next() else {
        return Ok(None);
    };

    let path = if let Some(value) = arg.strip_prefix("--transcript=") {
        PathBuf::from(value)
    } else if arg == "--transcript" {
        args.next()
            .map(PathBuf::from)
            .ok_or_else(|| "Expected value after --transcript".to_string())?
    } else {
        return Err(format!("Unknown argument `{arg}`"));
    };

    match args.next() {
        Some(extra) => Err(format!("Unexpected argument `{extra}`")),
        None => Ok(Some(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(input: &str) -> String {
        let mut session = Session::new(MonitorConfig::default());
        let mut output = Vec::new();
        run(&mut session, input.as_bytes(), &mut output).expect("in-memory io");
        String::from_utf8(output).expect("utf-8 output")
    }

    #[test]
    fn exit_stops_before_later_lines() {
        let output = transcript("init\nexit\nstart\n");
        assert!(output.contains("OK init"));
        assert!(output.contains("Session closed."));
        assert!(!output.contains("OK start"));
    }

    #[test]
    fn blank_lines_are_skipped_until_eof() {
        let output = transcript("\n   \ninit\n");
        assert_eq!(output.matches("OK init").count(), 1);
        assert!(!output.contains("ERR"));
    }
}
