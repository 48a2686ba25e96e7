use std::env;
use std::io;
use std::path::PathBuf;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use monitor_core::config::{MonitorConfig, StopPowerPolicy};
use session::Session;

const DEFAULT_DIR: &str = "transcripts";

fn main() -> io::Result<()> {
    let dir = env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_DIR), PathBuf::from);

    record_end_to_end(&dir)?;
    record_subscription(&dir)?;
    record_stop_release(&dir)?;
    Ok(())
}

fn record_end_to_end(dir: &std::path::Path) -> io::Result<()> {
    let mut session = Session::with_transcript(
        MonitorConfig::default(),
        &dir.join("end-to-end.log"),
        "Voltage Monitor end-to-end transcript",
    )?;
    for line in ["init", "status", "start", "start", "pulse 128 raw=2048", "avg", "log"] {
        session.handle_command(line)?;
    }
    Ok(())
}

fn record_subscription(dir: &std::path::Path) -> io::Result<()> {
    let mut session = Session::with_transcript(
        MonitorConfig::default(),
        &dir.join("subscription.log"),
        "Voltage Monitor subscription transcript",
    )?;
    for line in [
        "init",
        "notify on",
        "pulse 128 raw=4095",
        "pulse 128 raw=1024",
        "pulse 64 raw=2048",
        "notify off",
        "avg",
        "status",
    ] {
        session.handle_command(line)?;
    }
    Ok(())
}

fn record_stop_release(dir: &std::path::Path) -> io::Result<()> {
    let mut session = Session::with_transcript(
        MonitorConfig::default().with_stop_power(StopPowerPolicy::Release),
        &dir.join("stop-release.log"),
        "Voltage Monitor stop/release transcript",
    )?;
    for line in ["init", "start", "status", "stop", "status", "stop"] {
        session.handle_command(line)?;
    }
    Ok(())
}
