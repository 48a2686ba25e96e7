#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Lock-free snapshots of the sampling pipeline so any task can report the
//! last result without reaching into the monitor task.

use portable_atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

const NO_AVERAGE: u16 = u16::MAX;

/// Millivolt average of the last completed session (`u16::MAX` == none yet).
static LAST_AVERAGE_MV: AtomicU16 = AtomicU16::new(NO_AVERAGE);
/// Sessions that reached their completion signal.
static SESSIONS_COMPLETED: AtomicU32 = AtomicU32::new(0);
/// Whether a session is currently capturing.
static SESSION_ACTIVE: AtomicBool = AtomicBool::new(false);
/// Sensor supply level as last driven.
static POWER_HIGH: AtomicBool = AtomicBool::new(false);

/// Point-in-time copy of the status atomics.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StatusSnapshot {
    pub last_average_mv: Option<u16>,
    pub sessions_completed: u32,
    pub session_active: bool,
    pub power_high: bool,
}

/// Stores the average delivered with a completion signal.
pub fn record_completion(average_mv: u16) {
    LAST_AVERAGE_MV.store(average_mv.min(NO_AVERAGE - 1), Ordering::Relaxed);
    SESSIONS_COMPLETED.fetch_add(1, Ordering::Relaxed);
}

pub fn record_session_active(active: bool) {
    SESSION_ACTIVE.store(active, Ordering::Relaxed);
}

pub fn record_power(high: bool) {
    POWER_HIGH.store(high, Ordering::Relaxed);
}

/// Returns the most recent completed average, if any.
pub fn last_average_mv() -> Option<u16> {
    match LAST_AVERAGE_MV.load(Ordering::Relaxed) {
        NO_AVERAGE => None,
        value => Some(value),
    }
}

pub fn snapshot() -> StatusSnapshot {
    StatusSnapshot {
        last_average_mv: last_average_mv(),
        sessions_completed: SESSIONS_COMPLETED.load(Ordering::Relaxed),
        session_active: SESSION_ACTIVE.load(Ordering::Relaxed),
        power_high: POWER_HIGH.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_updates_average_and_count() {
        let before = snapshot().sessions_completed;
        record_completion(1650);

        let after = snapshot();
        assert!(after.sessions_completed > before);
        assert!(after.last_average_mv.is_some());
    }
}
