use core::time::Duration;

use monitor_core::config::{MonitorConfig, NUM_OF_SAMPLES, SAMPLE_PERIOD, SENSOR_WARMUP};
use monitor_core::hal::{Level, OneShotTimer, Peripherals, PowerOutput, TimerError};
use monitor_core::monitor::{StartOutcome, VoltageMonitor};
use monitor_core::power::PowerError;
use monitor_core::sim::SimBoard;
use monitor_core::telemetry::{TelemetryEventKind, TelemetryPayload};

fn initialized() -> VoltageMonitor<SimBoard> {
    let mut monitor = VoltageMonitor::new(Peripherals::simulated(), MonitorConfig::default());
    monitor.initialize().expect("simulated board initializes");
    monitor
}

#[test]
fn supply_rises_on_start_and_falls_after_warmup() {
    let mut monitor = initialized();
    assert_eq!(monitor.peripherals().power_pin.level(), Level::Low);

    monitor.start_next();
    assert_eq!(monitor.peripherals().power_pin.level(), Level::High);

    assert!(!monitor.simulate_elapsed(SENSOR_WARMUP - Duration::from_micros(1)));
    assert!(monitor.peripherals().power_pin.is_high());

    assert!(monitor.simulate_elapsed(Duration::from_micros(1)));
    assert!(!monitor.peripherals().power_pin.is_high());
    assert!(monitor.is_active(), "sampling continues after the window");
}

#[test]
fn window_closes_long_before_the_first_sample() {
    let mut monitor = initialized();
    monitor.start_next();

    // One sample period covers the whole warm-up window.
    assert!(monitor.simulate_elapsed(SAMPLE_PERIOD));
    for _ in 0..NUM_OF_SAMPLES {
        monitor.simulate_pulse(2048);
    }
    assert!(!monitor.peripherals().power_pin.is_high());
    assert_eq!(monitor.peripherals().power_pin.transitions(), 2);
}

#[test]
fn schedule_failure_is_reported_and_sampling_continues() {
    let mut monitor = initialized();
    monitor
        .peripherals_mut()
        .power_timer
        .reject_next(TimerError::Unavailable);

    let outcome = monitor.start_next();
    assert_eq!(
        outcome,
        StartOutcome::StartedUnpowered {
            session: 1,
            error: PowerError::Schedule(TimerError::Unavailable),
        }
    );
    let failure = monitor
        .telemetry()
        .oldest_first()
        .find(|record| record.event == TelemetryEventKind::PowerScheduleFailed)
        .expect("failure recorded");
    assert_eq!(
        failure.details,
        TelemetryPayload::Timer(TimerError::Unavailable)
    );

    let complete = (0..NUM_OF_SAMPLES)
        .filter_map(|_| monitor.simulate_pulse(2048))
        .next();
    assert_eq!(complete.map(|signal| signal.average_mv), Some(1650));
    assert!(!monitor.peripherals().power_timer.is_pending());
}

#[test]
fn restart_within_window_extends_it() {
    let mut monitor = initialized();
    monitor.start_next();
    for _ in 0..NUM_OF_SAMPLES {
        monitor.simulate_pulse(2048);
    }

    // The completed session never let time pass; the next one re-arms the timer.
    monitor.simulate_elapsed(Duration::from_micros(100));
    monitor.start_next();
    assert_eq!(
        monitor.peripherals().power_timer.remaining(),
        Some(SENSOR_WARMUP)
    );
    assert_eq!(monitor.power().window().map(|window| window.sequence), Some(1));
}
