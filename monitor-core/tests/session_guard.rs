use monitor_core::config::{MonitorConfig, NUM_OF_SAMPLES, StopPowerPolicy};
use monitor_core::hal::{OneShotTimer, Peripherals, PowerOutput};
use monitor_core::monitor::{MonitorEvent, SessionState, StartOutcome, StopOutcome, VoltageMonitor};
use monitor_core::sim::SimBoard;
use monitor_core::telemetry::TelemetryEventKind;

fn initialized(config: MonitorConfig) -> VoltageMonitor<SimBoard> {
    let mut monitor = VoltageMonitor::new(Peripherals::simulated(), config);
    monitor.initialize().expect("simulated board initializes");
    monitor
}

#[test]
fn repeated_start_matches_single_start() {
    let mut once = initialized(MonitorConfig::default());
    once.start_next();

    let mut twice = initialized(MonitorConfig::default());
    twice.start_next();
    assert_eq!(twice.start_next(), StartOutcome::AlreadyActive);

    assert_eq!(once.peripherals().snapshot(), twice.peripherals().snapshot());
    assert_eq!(once.session(), twice.session());
}

#[test]
fn repeated_start_mid_session_keeps_progress() {
    let mut monitor = initialized(MonitorConfig::default());
    monitor.start_next();
    for _ in 0..40 {
        monitor.simulate_pulse(10);
    }

    monitor.start_next();
    assert_eq!(monitor.peripherals().snapshot().transferred, 40);
}

#[test]
fn stop_prevents_completion_of_that_session() {
    let mut monitor = initialized(MonitorConfig::default());
    monitor.start_next();
    for _ in 0..(NUM_OF_SAMPLES - 1) {
        monitor.simulate_pulse(2048);
    }

    assert!(matches!(monitor.stop(), StopOutcome::Stopped { .. }));
    assert_eq!(monitor.state(), SessionState::Idle);

    for _ in 0..NUM_OF_SAMPLES {
        assert_eq!(monitor.simulate_pulse(2048), None);
    }
    assert_eq!(monitor.completed_average_mv(), None);
}

#[test]
fn late_completion_after_stop_is_not_signalled() {
    let mut monitor = initialized(MonitorConfig::default());
    monitor.start_next();
    monitor.stop();

    assert_eq!(monitor.handle_event(MonitorEvent::TransferComplete), None);
    assert_eq!(monitor.state(), SessionState::Idle);
    assert_eq!(
        monitor.telemetry().latest().map(|record| record.event),
        Some(TelemetryEventKind::StaleCompletion)
    );
}

#[test]
fn stop_while_idle_is_absorbed() {
    let mut monitor = initialized(MonitorConfig::default());
    assert_eq!(monitor.stop(), StopOutcome::AlreadyIdle);
    assert_eq!(monitor.state(), SessionState::Idle);
    assert!(monitor.start_next().started());
}

#[test]
fn restart_after_stop_begins_at_slot_zero() {
    let mut monitor = initialized(MonitorConfig::default());
    monitor.start_next();
    for _ in 0..64 {
        monitor.simulate_pulse(4095);
    }
    monitor.stop();

    assert_eq!(monitor.start_next(), StartOutcome::Started(2));
    let complete = (0..NUM_OF_SAMPLES)
        .filter_map(|_| monitor.simulate_pulse(0))
        .next()
        .expect("second session completes");
    assert_eq!(complete.average_mv, 0);
}

#[test]
fn default_stop_leaves_supply_high_until_timer() {
    let mut monitor = initialized(MonitorConfig::default());
    monitor.start_next();
    monitor.stop();

    let hw = monitor.peripherals();
    assert!(hw.power_pin.is_high());
    assert!(hw.power_timer.is_pending());
}

#[test]
fn release_policy_stop_drops_supply() {
    let mut monitor =
        initialized(MonitorConfig::default().with_stop_power(StopPowerPolicy::Release));
    monitor.start_next();
    monitor.stop();

    let hw = monitor.peripherals();
    assert!(!hw.power_pin.is_high());
    assert!(!hw.power_timer.is_pending());
    assert!(monitor.power().window().is_none());
}
