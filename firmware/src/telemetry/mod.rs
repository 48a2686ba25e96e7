//! Mirrors core telemetry records to defmt / stdout.
//!
//! The monitor keeps its own fixed-capacity ring. The firmware only needs to
//! forward the records appended since the last mirror pass so RTT shows the
//! session history as it happens.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use monitor_core::monitor::{InitError, SessionComplete};

use crate::status::StatusSnapshot;
use monitor_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryPayload, TelemetryRecord, TelemetryRecorder,
};

/// Tracks which telemetry records have already been logged.
#[derive(Debug, Default)]
pub struct TelemetryMirror {
    cursor: EventId,
}

impl TelemetryMirror {
    #[must_use]
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Logs every record newer than the previous pass and returns how many
    /// were emitted.
    pub fn forward(&mut self, recorder: &TelemetryRecorder) -> usize {
        let mut emitted = 0;
        for record in recorder.since(self.cursor) {
            log_record(record);
            emitted += 1;
        }
        self.cursor = recorder.next_id();
        emitted
    }

    /// Id of the next record the mirror expects.
    #[must_use]
    pub const fn cursor(&self) -> EventId {
        self.cursor
    }
}

fn log_record(record: &TelemetryRecord) {
    let label = event_label(record.event);
    let code = record.event.to_raw();
    match record.details {
        TelemetryPayload::None => emit_log(record.id, record.session, label, code, None),
        TelemetryPayload::Completion {
            samples,
            average_mv,
        } => emit_log(
            record.id,
            record.session,
            label,
            code,
            Some(Detail::Completion {
                samples,
                average_mv,
            }),
        ),
        TelemetryPayload::Aborted { samples } => emit_log(
            record.id,
            record.session,
            label,
            code,
            Some(Detail::Aborted { samples }),
        ),
        TelemetryPayload::Timer(_) => emit_log(
            record.id,
            record.session,
            label,
            code,
            Some(Detail::TimerRejected),
        ),
    }
}

#[derive(Copy, Clone)]
enum Detail {
    Completion { samples: u16, average_mv: u16 },
    Aborted { samples: u16 },
    TimerRejected,
}

#[cfg(target_os = "none")]
fn emit_log(id: EventId, session: u32, label: &'static str, code: u16, detail: Option<Detail>) {
    match detail {
        Some(Detail::Completion {
            samples,
            average_mv,
        }) => defmt::info!(
            "telemetry:{} #{} session={} code={=u16:#x} samples={} avg={}mV",
            label,
            id,
            session,
            code,
            samples,
            average_mv
        ),
        Some(Detail::Aborted { samples }) => defmt::info!(
            "telemetry:{} #{} session={} code={=u16:#x} samples={}",
            label,
            id,
            session,
            code,
            samples
        ),
        Some(Detail::TimerRejected) => defmt::warn!(
            "telemetry:{} #{} session={} code={=u16:#x} timer rejected",
            label,
            id,
            session,
            code
        ),
        None => defmt::info!(
            "telemetry:{} #{} session={} code={=u16:#x}",
            label,
            id,
            session,
            code
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(id: EventId, session: u32, label: &'static str, code: u16, detail: Option<Detail>) {
    match detail {
        Some(Detail::Completion {
            samples,
            average_mv,
        }) => println!(
            "telemetry:{label} #{id} session={session} code={code:#06x} samples={samples} avg={average_mv}mV"
        ),
        Some(Detail::Aborted { samples }) => {
            println!(
                "telemetry:{label} #{id} session={session} code={code:#06x} samples={samples}"
            );
        }
        Some(Detail::TimerRejected) => {
            println!("telemetry:{label} #{id} session={session} code={code:#06x} timer rejected");
        }
        None => println!("telemetry:{label} #{id} session={session} code={code:#06x}"),
    }
}

/// Logs the average handed to the report task with the running totals.
pub fn log_report(complete: &SessionComplete, status: &StatusSnapshot) {
    emit_report(
        complete.session,
        complete.average_mv,
        status.sessions_completed,
        status.session_active,
        status.power_high,
    );
}

/// Logs a pipeline configuration failure.
pub fn log_init_failure(error: &InitError) {
    emit_init_failure(peripheral_label(error));
}

#[cfg(target_os = "none")]
fn emit_report(session: u32, average_mv: u16, completed: u32, active: bool, power_high: bool) {
    defmt::info!(
        "report: session={} avg={}mV completed={} active={} power={}",
        session,
        average_mv,
        completed,
        active,
        if power_high { "high" } else { "low" }
    );
}

#[cfg(not(target_os = "none"))]
fn emit_report(session: u32, average_mv: u16, completed: u32, active: bool, power_high: bool) {
    let power = if power_high { "high" } else { "low" };
    println!(
        "report: session={session} avg={average_mv}mV completed={completed} active={active} power={power}"
    );
}

#[cfg(target_os = "none")]
fn emit_init_failure(peripheral: &'static str) {
    defmt::error!("init: {} failed to configure", peripheral);
}

#[cfg(not(target_os = "none"))]
fn emit_init_failure(peripheral: &'static str) {
    eprintln!("init: {peripheral} failed to configure");
}

const fn event_label(kind: TelemetryEventKind) -> &'static str {
    match kind {
        TelemetryEventKind::Initialized => "init",
        TelemetryEventKind::SessionStarted => "start",
        TelemetryEventKind::StartIgnored => "start-ignored",
        TelemetryEventKind::SessionStopped => "stop",
        TelemetryEventKind::StopIgnored => "stop-ignored",
        TelemetryEventKind::SessionComplete => "complete",
        TelemetryEventKind::StaleCompletion => "stale",
        TelemetryEventKind::PowerEngaged => "power-high",
        TelemetryEventKind::PowerReleased => "power-low",
        TelemetryEventKind::PowerScheduleFailed => "power-timer",
        TelemetryEventKind::Custom(_) => "custom",
    }
}

fn peripheral_label(error: &InitError) -> &'static str {
    use monitor_core::hal::PeripheralId;

    match error.peripheral {
        PeripheralId::Clocks => "clocks",
        PeripheralId::TriggerGenerator => "trigger",
        PeripheralId::SignalRouter => "router",
        PeripheralId::Converter => "converter",
        PeripheralId::TransferEngine => "transfer",
        PeripheralId::PowerOutput => "power-pin",
        PeripheralId::PowerTimer => "power-timer",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_only_new_records() {
        let mut recorder = TelemetryRecorder::new();
        let mut mirror = TelemetryMirror::new();

        recorder.record(0, TelemetryEventKind::Initialized, TelemetryPayload::None);
        recorder.record(1, TelemetryEventKind::SessionStarted, TelemetryPayload::None);
        assert_eq!(mirror.forward(&recorder), 2);
        assert_eq!(mirror.cursor(), 2);

        assert_eq!(mirror.forward(&recorder), 0);

        recorder.record(
            1,
            TelemetryEventKind::SessionComplete,
            TelemetryPayload::Completion {
                samples: 128,
                average_mv: 1650,
            },
        );
        assert_eq!(mirror.forward(&recorder), 1);
        assert_eq!(mirror.cursor(), 3);
    }

    #[test]
    fn labels_cover_custom_codes() {
        assert_eq!(event_label(TelemetryEventKind::from_raw(0x0bee)), "custom");
        assert_eq!(event_label(TelemetryEventKind::from_raw(0x0014)), "complete");
    }
}
