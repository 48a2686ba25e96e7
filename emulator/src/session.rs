use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use monitor_core::config::{
    MonitorConfig, NUM_OF_SAMPLES, SAMPLE_PERIOD, TRIGGER_SOURCE_CLOCK_HZ,
};
use monitor_core::console::{self, COMMANDS, CommandSpec, ConsoleCommand};
use monitor_core::hal::{Level, Peripherals, PowerOutput, TransferEngine};
use monitor_core::monitor::{
    SessionComplete, SessionState, StartOutcome, StopOutcome, VoltageMonitor,
};
use monitor_core::sim::SimBoard;
use monitor_core::telemetry::{TelemetryPayload, TelemetryRecord};

/// One emulator run: a simulated monitor plus the collaborator stand-in.
pub struct Session {
    monitor: VoltageMonitor<SimBoard>,
    transcript: Option<TranscriptLogger>,
    /// Simulated time since the session was created.
    clock: Duration,
    /// When set, every completion is reported and sampling restarts.
    notify: bool,
    reports: usize,
}

impl Session {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            monitor: VoltageMonitor::new(Peripherals::simulated(), config),
            transcript: None,
            clock: Duration::ZERO,
            notify: false,
            reports: 0,
        }
    }

    /// Mirrors every command and response into a transcript at `path`.
    pub fn with_transcript(config: MonitorConfig, path: &Path, header: &str) -> io::Result<Self> {
        let mut session = Self::new(config);
        session.transcript = Some(TranscriptLogger::create(path, header)?);
        Ok(session)
    }

    pub fn monitor(&self) -> &VoltageMonitor<SimBoard> {
        &self.monitor
    }

    /// Averages delivered to the subscriber so far.
    pub fn reports(&self) -> usize {
        self.reports
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.clock;
        self.log(elapsed, TranscriptRole::Host, trimmed)?;

        let lines = match console::parse(trimmed) {
            Ok(command) => self.execute(command),
            Err(err) => vec![format!("ERR syntax {err}")],
        };

        for response in &lines {
            self.log(self.clock, TranscriptRole::Emulator, response)?;
        }
        Ok(lines)
    }

    fn execute(&mut self, command: ConsoleCommand<'_>) -> Vec<String> {
        match command {
            ConsoleCommand::Init => self.handle_init(),
            ConsoleCommand::Start => vec![describe_start(self.monitor.start_next())],
            ConsoleCommand::Stop => vec![describe_stop(self.monitor.stop())],
            ConsoleCommand::Average => vec![self.describe_average()],
            ConsoleCommand::Status => self.describe_status(),
            ConsoleCommand::Log => self.describe_log(),
            ConsoleCommand::Pulse { count, raw } => self.handle_pulse(count, raw),
            ConsoleCommand::Wait(duration) => self.handle_wait(duration),
            ConsoleCommand::Notify(enabled) => self.handle_notify(enabled),
            ConsoleCommand::Help(topic) => describe_help(topic),
            ConsoleCommand::HelpUnknown(topic) => vec![
                format!("No help available for `{topic}`."),
                format!("Available topics: {}", help_topic_list()),
            ],
        }
    }

    fn handle_init(&mut self) -> Vec<String> {
        match self.monitor.initialize() {
            Ok(()) => {
                let Some(timing) = self.monitor.timing() else {
                    return vec!["ERR init timing unavailable".to_string()];
                };
                vec![format!(
                    "OK init prescaler={} period={} rate={}Hz samples={}",
                    timing.prescaler,
                    timing.period,
                    timing.achieved_hz(TRIGGER_SOURCE_CLOCK_HZ),
                    NUM_OF_SAMPLES,
                )]
            }
            Err(err) => vec![format!("ERR init {err}")],
        }
    }

    fn handle_pulse(&mut self, count: u16, raw: u16) -> Vec<String> {
        let mut lines = Vec::new();
        let mut captured = 0_usize;

        for _ in 0..count {
            lines.extend(self.advance(SAMPLE_PERIOD));

            let before = self.monitor.peripherals().transfer.transferred();
            let signal = self.monitor.simulate_pulse(u32::from(raw));
            let after = self.monitor.peripherals().transfer.transferred();
            if after != before || signal.is_some() {
                captured += 1;
            }

            if let Some(complete) = signal {
                lines.extend(self.on_complete(complete));
            }
        }

        lines.insert(
            0,
            format!("OK pulse count={count} raw={raw} captured={captured}"),
        );
        lines
    }

    fn handle_wait(&mut self, duration: Duration) -> Vec<String> {
        let mut lines = vec![format!("OK wait {}", format_duration_short(duration))];
        lines.extend(self.advance(duration));
        lines
    }

    fn handle_notify(&mut self, enabled: bool) -> Vec<String> {
        if !enabled {
            self.notify = false;
            let stop = describe_stop(self.monitor.stop());
            return vec!["OK notify off".to_string(), stop];
        }

        if !self.monitor.is_initialized() {
            return vec!["ERR notify pipeline not initialized".to_string()];
        }

        self.notify = true;
        let mut lines = vec!["OK notify on".to_string()];
        if self.monitor.state() == SessionState::Idle {
            lines.push(describe_start(self.monitor.start_next()));
        }
        lines
    }

    /// Lets simulated time pass, reporting a closed power window.
    fn advance(&mut self, duration: Duration) -> Option<String> {
        self.clock = self.clock.saturating_add(duration);
        self.monitor
            .simulate_elapsed(duration)
            .then(|| format!("EVT power low session={}", self.monitor.session()))
    }

    /// Completion signal: the subscriber reads the average and restarts.
    fn on_complete(&mut self, complete: SessionComplete) -> Vec<String> {
        let mut lines = vec![format!(
            "EVT complete session={} samples={} avg={}mV",
            complete.session, complete.samples, complete.average_mv
        )];

        if self.notify {
            let average = self.monitor.average_mv();
            self.reports += 1;
            lines.push(format!("NOTIFY avg={average}mV"));
            lines.push(describe_start(self.monitor.start_next()));
        }
        lines
    }

    fn describe_average(&self) -> String {
        match self.monitor.completed_average_mv() {
            Some(average) => format!("OK avg={average}mV session={}", self.monitor.session()),
            None => format!(
                "OK avg={}mV (no completed session in buffer)",
                self.monitor.average_mv()
            ),
        }
    }

    fn describe_status(&self) -> Vec<String> {
        let hw = self.monitor.peripherals();
        let snapshot = hw.snapshot();
        let window = snapshot
            .power_remaining
            .map_or_else(|| "none".to_string(), format_duration_short);

        vec![
            format!(
                "state={} session={} initialized={}",
                state_label(self.monitor.state()),
                self.monitor.session(),
                self.monitor.is_initialized(),
            ),
            format!(
                "transfer armed={} transferred={}/{}",
                snapshot.transfer_armed, snapshot.transferred, NUM_OF_SAMPLES
            ),
            format!(
                "trigger running={} pulses={} converter active={} conversions={}",
                snapshot.trigger_running,
                hw.trigger.pulses(),
                snapshot.converting,
                hw.converter.conversions(),
            ),
            format!(
                "power level={} window={window} stop-policy={:?}",
                level_label(hw.power_pin.level()),
                self.monitor.config().stop_power,
            ),
            format!(
                "notify={} reports={} clock=+{}ms",
                if self.notify { "on" } else { "off" },
                self.reports,
                self.clock.as_millis()
            ),
        ]
    }

    fn describe_log(&self) -> Vec<String> {
        let telemetry = self.monitor.telemetry();
        if telemetry.is_empty() {
            return vec!["telemetry empty".to_string()];
        }
        telemetry.oldest_first().map(describe_record).collect()
    }

    fn log(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        match self.transcript.as_mut() {
            Some(transcript) => transcript.append_line(elapsed, role, line),
            None => Ok(()),
        }
    }
}

fn describe_start(outcome: StartOutcome) -> String {
    match outcome {
        StartOutcome::Started(session) => format!("OK start session={session}"),
        StartOutcome::StartedUnpowered { session, error } => {
            format!("OK start session={session} power-warning=\"{error}\"")
        }
        StartOutcome::AlreadyActive => "OK start ignored (session active)".to_string(),
        StartOutcome::Uninitialized => "ERR start pipeline not initialized".to_string(),
    }
}

fn describe_stop(outcome: StopOutcome) -> String {
    match outcome {
        StopOutcome::Stopped {
            session,
            transferred,
        } => format!("OK stop session={session} transferred={transferred}"),
        StopOutcome::AlreadyIdle => "OK stop ignored (idle)".to_string(),
    }
}

fn describe_record(record: &TelemetryRecord) -> String {
    let details = match record.details {
        TelemetryPayload::None => String::new(),
        TelemetryPayload::Completion {
            samples,
            average_mv,
        } => format!(" samples={samples} avg={average_mv}mV"),
        TelemetryPayload::Aborted { samples } => format!(" samples={samples}"),
        TelemetryPayload::Timer(err) => format!(" cause=\"{err}\""),
    };
    format!(
        "#{:<4} session={:<3} code=0x{:04x} {}{details}",
        record.id,
        record.session,
        record.event.to_raw(),
        record.event,
    )
}

fn describe_help(topic: Option<&'static CommandSpec>) -> Vec<String> {
    match topic {
        Some(entry) => vec![format!("{:<30} - {}", entry.usage, entry.summary)],
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            for entry in COMMANDS {
                lines.push(format!("  {:<30} - {}", entry.usage, entry.summary));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
            lines
        }
    }
}

fn help_topic_list() -> String {
    COMMANDS
        .iter()
        .map(|entry| entry.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::Idle => "idle",
        SessionState::Active => "active",
    }
}

fn level_label(level: Level) -> &'static str {
    match level {
        Level::Low => "low",
        Level::High => "high",
    }
}

fn format_duration_short(duration: Duration) -> String {
    if duration.as_secs() > 0 {
        format!("{:.3}s", duration.as_secs_f64())
    } else if duration.as_millis() > 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{}us", duration.as_micros())
    }
}

struct TranscriptLogger {
    writer: BufWriter<File>,
}

impl TranscriptLogger {
    fn create(path: &Path, header: &str) -> io::Result<Self> {
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
        logger.write_header(header)?;
        Ok(logger)
    }

    fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.writer, "# {header}")?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since session start"
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
