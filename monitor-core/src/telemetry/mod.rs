//! Telemetry event catalog and the bounded record ring kept by the monitor.
//!
//! Every state-machine decision (including the silently absorbed ones such as
//! a repeated `start_next`) lands here so firmware and emulator can mirror it
//! to their own log sinks. Events carry compact numeric codes for transports
//! that cannot afford strings.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::hal::TimerError;

/// Number of records retained by [`TelemetryRecorder`].
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Identifier assigned to each telemetry record.
pub type EventId = u32;

/// Session counter; 0 means no session has started yet.
pub type SessionId = u32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    Initialized,
    SessionStarted,
    StartIgnored,
    SessionStopped,
    StopIgnored,
    SessionComplete,
    StaleCompletion,
    PowerEngaged,
    PowerReleased,
    PowerScheduleFailed,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::Initialized => f.write_str("initialized"),
            TelemetryEventKind::SessionStarted => f.write_str("session-started"),
            TelemetryEventKind::StartIgnored => f.write_str("start-ignored"),
            TelemetryEventKind::SessionStopped => f.write_str("session-stopped"),
            TelemetryEventKind::StopIgnored => f.write_str("stop-ignored"),
            TelemetryEventKind::SessionComplete => f.write_str("session-complete"),
            TelemetryEventKind::StaleCompletion => f.write_str("stale-completion"),
            TelemetryEventKind::PowerEngaged => f.write_str("power-engaged"),
            TelemetryEventKind::PowerReleased => f.write_str("power-released"),
            TelemetryEventKind::PowerScheduleFailed => f.write_str("power-schedule-failed"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const INITIALIZED_CODE: u16 = 0x0001;
    const SESSION_STARTED_CODE: u16 = 0x0010;
    const START_IGNORED_CODE: u16 = 0x0011;
    const SESSION_STOPPED_CODE: u16 = 0x0012;
    const STOP_IGNORED_CODE: u16 = 0x0013;
    const SESSION_COMPLETE_CODE: u16 = 0x0014;
    const STALE_COMPLETION_CODE: u16 = 0x0015;
    const POWER_ENGAGED_CODE: u16 = 0x0020;
    const POWER_RELEASED_CODE: u16 = 0x0021;
    const POWER_SCHEDULE_FAILED_CODE: u16 = 0x0022;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::Initialized => Self::INITIALIZED_CODE,
            TelemetryEventKind::SessionStarted => Self::SESSION_STARTED_CODE,
            TelemetryEventKind::StartIgnored => Self::START_IGNORED_CODE,
            TelemetryEventKind::SessionStopped => Self::SESSION_STOPPED_CODE,
            TelemetryEventKind::StopIgnored => Self::STOP_IGNORED_CODE,
            TelemetryEventKind::SessionComplete => Self::SESSION_COMPLETE_CODE,
            TelemetryEventKind::StaleCompletion => Self::STALE_COMPLETION_CODE,
            TelemetryEventKind::PowerEngaged => Self::POWER_ENGAGED_CODE,
            TelemetryEventKind::PowerReleased => Self::POWER_RELEASED_CODE,
            TelemetryEventKind::PowerScheduleFailed => Self::POWER_SCHEDULE_FAILED_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub const fn from_raw(code: u16) -> Self {
        match code {
            Self::INITIALIZED_CODE => TelemetryEventKind::Initialized,
            Self::SESSION_STARTED_CODE => TelemetryEventKind::SessionStarted,
            Self::START_IGNORED_CODE => TelemetryEventKind::StartIgnored,
            Self::SESSION_STOPPED_CODE => TelemetryEventKind::SessionStopped,
            Self::STOP_IGNORED_CODE => TelemetryEventKind::StopIgnored,
            Self::SESSION_COMPLETE_CODE => TelemetryEventKind::SessionComplete,
            Self::STALE_COMPLETION_CODE => TelemetryEventKind::StaleCompletion,
            Self::POWER_ENGAGED_CODE => TelemetryEventKind::PowerEngaged,
            Self::POWER_RELEASED_CODE => TelemetryEventKind::PowerReleased,
            Self::POWER_SCHEDULE_FAILED_CODE => TelemetryEventKind::PowerScheduleFailed,
            other => TelemetryEventKind::Custom(other),
        }
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryPayload {
    None,
    /// Buffer summary for a finished session.
    Completion { samples: u16, average_mv: u16 },
    /// Partial progress when a session is stopped early.
    Aborted { samples: u16 },
    /// Why the power window could not be armed.
    Timer(TimerError),
}

/// Telemetry record stored in the ring.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub session: SessionId,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Fixed-capacity history of telemetry records.
pub struct TelemetryRecorder {
    ring: HistoryBuf<TelemetryRecord, TELEMETRY_RING_CAPACITY>,
    next_event_id: EventId,
}

impl TelemetryRecorder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Records `event` for `session`, returning its identifier.
    pub fn record(
        &mut self,
        session: SessionId,
        event: TelemetryEventKind,
        details: TelemetryPayload,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord {
            id,
            session,
            event,
            details,
        });
        id
    }

    /// Records in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Records with an identifier at or after `id`, oldest first.
    pub fn since(&self, id: EventId) -> impl Iterator<Item = &TelemetryRecord> {
        self.oldest_first().filter(move |record| record.id >= id)
    }

    /// Identifier the next record will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

impl Default for TelemetryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_codes_round_trip_known_events() {
        let events = [
            TelemetryEventKind::Initialized,
            TelemetryEventKind::SessionStarted,
            TelemetryEventKind::StartIgnored,
            TelemetryEventKind::SessionStopped,
            TelemetryEventKind::StopIgnored,
            TelemetryEventKind::SessionComplete,
            TelemetryEventKind::StaleCompletion,
            TelemetryEventKind::PowerEngaged,
            TelemetryEventKind::PowerReleased,
            TelemetryEventKind::PowerScheduleFailed,
        ];
        for event in events {
            assert_eq!(TelemetryEventKind::from_raw(event.to_raw()), event);
        }
        assert_eq!(
            TelemetryEventKind::from_raw(0x7777),
            TelemetryEventKind::Custom(0x7777)
        );
    }

    #[test]
    fn recorder_keeps_most_recent_records() {
        let mut recorder = TelemetryRecorder::new();
        assert!(recorder.is_empty());

        for session in 0..(TELEMETRY_RING_CAPACITY as u32 + 4) {
            recorder.record(
                session,
                TelemetryEventKind::SessionStarted,
                TelemetryPayload::None,
            );
        }

        assert_eq!(recorder.len(), TELEMETRY_RING_CAPACITY);
        let oldest = recorder.oldest_first().next().copied().unwrap();
        assert_eq!(oldest.id, 4);
        assert_eq!(recorder.latest().map(|record| record.id), Some(35));
        assert_eq!(recorder.next_id(), 36);
        assert_eq!(recorder.since(34).count(), 2);
    }
}
