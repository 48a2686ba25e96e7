use monitor_core::config::{MonitorConfig, NUM_OF_SAMPLES};
use monitor_core::hal::{Peripherals, TransferEngine};
use monitor_core::monitor::{SessionState, StartOutcome, VoltageMonitor};
use monitor_core::sim::SimBoard;
use monitor_core::telemetry::{TelemetryEventKind, TelemetryPayload};

fn initialized() -> VoltageMonitor<SimBoard> {
    let mut monitor = VoltageMonitor::new(Peripherals::simulated(), MonitorConfig::default());
    monitor.initialize().expect("simulated board initializes");
    monitor
}

#[test]
fn mid_scale_session_averages_to_1650_mv() {
    let mut monitor = initialized();
    assert_eq!(monitor.start_next(), StartOutcome::Started(1));

    let mut signals = 0;
    let mut last = None;
    for _ in 0..NUM_OF_SAMPLES {
        if let Some(complete) = monitor.simulate_pulse(2048) {
            signals += 1;
            last = Some(complete);
        }
    }

    assert_eq!(signals, 1);
    let complete = last.expect("completion signal");
    assert_eq!(complete.session, 1);
    assert_eq!(complete.samples, NUM_OF_SAMPLES);
    assert_eq!(complete.average_mv, 1650);

    let transfer = &monitor.peripherals().transfer;
    assert_eq!(transfer.transferred(), NUM_OF_SAMPLES);
    assert!(transfer.landed().iter().all(|raw| *raw == 2048));

    assert_eq!(monitor.average_mv(), 1650);
    assert_eq!(monitor.completed_average_mv(), Some(1650));
    assert_eq!(monitor.state(), SessionState::Idle);
}

#[test]
fn extra_pulses_after_completion_are_not_captured() {
    let mut monitor = initialized();
    monitor.start_next();
    for _ in 0..NUM_OF_SAMPLES {
        monitor.simulate_pulse(1000);
    }

    for _ in 0..10 {
        assert_eq!(monitor.simulate_pulse(4095), None);
    }
    assert_eq!(monitor.peripherals().transfer.transferred(), NUM_OF_SAMPLES);
    assert_eq!(monitor.average_mv(), 805);
}

#[test]
fn collaborator_restart_loop_reuses_the_buffer() {
    let mut monitor = initialized();
    let mut averages = [0_u16; 3];

    for (round, raw) in [4095_u32, 0, 2048].into_iter().enumerate() {
        assert!(monitor.start_next().started());
        let complete = (0..NUM_OF_SAMPLES)
            .filter_map(|_| monitor.simulate_pulse(raw))
            .last()
            .expect("each round completes");
        averages[round] = monitor
            .completed_average_mv()
            .expect("result valid after completion");
        assert_eq!(complete.average_mv, averages[round]);
    }

    assert_eq!(averages, [3300, 0, 1650]);
    assert_eq!(monitor.session(), 3);

    let completions: Vec<_> = monitor
        .telemetry()
        .oldest_first()
        .filter(|record| record.event == TelemetryEventKind::SessionComplete)
        .map(|record| record.details)
        .collect();
    assert_eq!(
        completions.last(),
        Some(&TelemetryPayload::Completion {
            samples: 128,
            average_mv: 1650
        })
    );
}
