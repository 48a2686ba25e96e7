//! Sampling state machine shared by firmware and emulator.
//!
//! [`VoltageMonitor`] owns the peripherals, the power sequencer, and the
//! session flag. Application calls (`initialize`, `start_next`, `stop`) and
//! hardware notifications ([`MonitorEvent`]) are both funnelled through it, so
//! a target only needs a single task or loop that owns the monitor and feeds
//! it events from whatever interrupt mechanism the platform offers.

use core::fmt;

use crate::average;
use crate::config::{
    MonitorConfig, NUM_OF_SAMPLES, SAMPLING_FREQ_HZ, StopPowerPolicy, TriggerTiming,
};
use crate::hal::{
    ALL_CLOCK_DOMAINS, Board, ClockControl, Converter, HardwareFault, Level, PeripheralId,
    Peripherals, PowerOutput, SignalRouter, TransferConfig, TransferEngine, TransferRequest,
    TransferSource, TriggerGenerator, TriggerRoute,
};
use crate::power::{PowerError, PowerSequencer};
use crate::telemetry::{SessionId, TelemetryEventKind, TelemetryPayload, TelemetryRecorder};

/// Whether a session is currently capturing.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SessionState {
    #[default]
    Idle,
    Active,
}

/// Hardware notifications delivered to [`VoltageMonitor::handle_event`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MonitorEvent {
    /// The transfer engine copied its configured count and raised its interrupt.
    TransferComplete,
    /// The power window timer fired.
    PowerWindowElapsed,
}

/// Completion signal emitted once per finished session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SessionComplete {
    pub session: SessionId,
    /// Transfers that landed in the buffer.
    pub samples: usize,
    /// Buffer average at the moment of completion.
    pub average_mv: u16,
}

/// Result of [`VoltageMonitor::start_next`].
///
/// Callers may ignore it; misuse is absorbed rather than reported as an error.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StartOutcome {
    Started(SessionId),
    /// Sampling runs but the power window could not be scheduled.
    StartedUnpowered {
        session: SessionId,
        error: PowerError,
    },
    AlreadyActive,
    /// `initialize` has not succeeded yet; no hardware was touched.
    Uninitialized,
}

impl StartOutcome {
    /// Returns `true` when a new session began.
    #[must_use]
    pub const fn started(&self) -> bool {
        matches!(
            self,
            StartOutcome::Started(_) | StartOutcome::StartedUnpowered { .. }
        )
    }
}

/// Result of [`VoltageMonitor::stop`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopOutcome {
    /// An active session was abandoned after `transferred` samples.
    Stopped {
        session: SessionId,
        transferred: usize,
    },
    AlreadyIdle,
}

/// Fatal configuration failure during [`VoltageMonitor::initialize`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct InitError {
    pub peripheral: PeripheralId,
    pub fault: HardwareFault,
}

impl InitError {
    const fn new(peripheral: PeripheralId, fault: HardwareFault) -> Self {
        Self { peripheral, fault }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} setup failed: {}", self.peripheral, self.fault)
    }
}

/// Single owned context for one sampling pipeline.
pub struct VoltageMonitor<B: Board> {
    hw: Peripherals<B>,
    power: PowerSequencer,
    config: MonitorConfig,
    timing: Option<TriggerTiming>,
    state: SessionState,
    session: SessionId,
    result_valid: bool,
    telemetry: TelemetryRecorder,
}

impl<B: Board> VoltageMonitor<B> {
    /// Wraps the peripherals; nothing is configured until [`initialize`](Self::initialize).
    pub fn new(hw: Peripherals<B>, config: MonitorConfig) -> Self {
        Self {
            hw,
            power: PowerSequencer::new(config.warmup),
            config,
            timing: None,
            state: SessionState::Idle,
            session: 0,
            result_valid: false,
            telemetry: TelemetryRecorder::new(),
        }
    }

    /// Configures every block of the pipeline, leaving sampling disabled.
    ///
    /// Calling it again after a success is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first peripheral that refused its configuration. The
    /// pipeline is unusable afterwards.
    pub fn initialize(&mut self) -> Result<(), InitError> {
        if self.timing.is_some() {
            return Ok(());
        }

        for domain in ALL_CLOCK_DOMAINS {
            self.hw
                .clocks
                .enable(domain)
                .map_err(|fault| InitError::new(PeripheralId::Clocks, fault))?;
        }

        let timing = TriggerTiming::derive(
            self.hw.trigger.source_clock_hz(),
            SAMPLING_FREQ_HZ,
            <B::Trigger as TriggerGenerator>::COUNTER_BITS,
        )
        .ok_or(InitError::new(
            PeripheralId::TriggerGenerator,
            HardwareFault::Unsupported,
        ))?;
        self.hw
            .trigger
            .configure(timing)
            .map_err(|fault| InitError::new(PeripheralId::TriggerGenerator, fault))?;

        self.hw
            .router
            .connect(TriggerRoute::TIMER_TO_CONVERTER)
            .map_err(|fault| InitError::new(PeripheralId::SignalRouter, fault))?;

        self.hw
            .converter
            .configure(&self.config.converter)
            .map_err(|fault| InitError::new(PeripheralId::Converter, fault))?;

        self.hw
            .transfer
            .configure(TransferConfig {
                source: TransferSource::ConverterResult,
                request: TransferRequest::ConverterDataReady,
                count: NUM_OF_SAMPLES,
                interrupt_on_done: true,
            })
            .map_err(|fault| InitError::new(PeripheralId::TransferEngine, fault))?;

        self.hw
            .power_pin
            .configure(Level::Low)
            .map_err(|fault| InitError::new(PeripheralId::PowerOutput, fault))?;

        self.timing = Some(timing);
        self.telemetry.record(
            self.session,
            TelemetryEventKind::Initialized,
            TelemetryPayload::None,
        );
        Ok(())
    }

    /// Begins one sampling session unless one is already running.
    ///
    /// The converter and transfer engine are armed before the trigger
    /// generator is enabled so the first pulse always lands in slot 0.
    pub fn start_next(&mut self) -> StartOutcome {
        if self.timing.is_none() {
            return StartOutcome::Uninitialized;
        }
        if self.state == SessionState::Active {
            self.telemetry.record(
                self.session,
                TelemetryEventKind::StartIgnored,
                TelemetryPayload::None,
            );
            return StartOutcome::AlreadyActive;
        }

        self.session = self.session.wrapping_add(1);
        self.result_valid = false;

        self.hw.converter.start();
        self.hw.transfer.arm();
        self.hw.trigger.enable();
        let power = self
            .power
            .engage(&mut self.hw.power_pin, &mut self.hw.power_timer);
        self.state = SessionState::Active;

        self.telemetry.record(
            self.session,
            TelemetryEventKind::SessionStarted,
            TelemetryPayload::None,
        );
        match power {
            Ok(()) => {
                self.telemetry.record(
                    self.session,
                    TelemetryEventKind::PowerEngaged,
                    TelemetryPayload::None,
                );
                StartOutcome::Started(self.session)
            }
            Err(error) => {
                let PowerError::Schedule(cause) = error;
                self.telemetry.record(
                    self.session,
                    TelemetryEventKind::PowerScheduleFailed,
                    TelemetryPayload::Timer(cause),
                );
                StartOutcome::StartedUnpowered {
                    session: self.session,
                    error,
                }
            }
        }
    }

    /// Halts the trigger chain and clears the session flag.
    ///
    /// The hardware is stopped even when already idle. The sensor supply is
    /// only touched under [`StopPowerPolicy::Release`].
    pub fn stop(&mut self) -> StopOutcome {
        let was_active = self.state == SessionState::Active;

        self.hw.trigger.disable();
        self.hw.converter.stop();
        // No further requests can reach the channel; count before disarming.
        let transferred = self.hw.transfer.transferred();
        self.state = SessionState::Idle;
        self.hw.transfer.disarm();

        if self.config.stop_power == StopPowerPolicy::Release
            && self
                .power
                .release(&mut self.hw.power_pin, &mut self.hw.power_timer)
        {
            self.telemetry.record(
                self.session,
                TelemetryEventKind::PowerReleased,
                TelemetryPayload::None,
            );
        }

        if !was_active {
            self.telemetry.record(
                self.session,
                TelemetryEventKind::StopIgnored,
                TelemetryPayload::None,
            );
            return StopOutcome::AlreadyIdle;
        }

        self.telemetry.record(
            self.session,
            TelemetryEventKind::SessionStopped,
            TelemetryPayload::Aborted {
                samples: saturate(transferred),
            },
        );
        StopOutcome::Stopped {
            session: self.session,
            transferred,
        }
    }

    /// Applies a hardware notification, returning the completion signal when
    /// a session finished.
    pub fn handle_event(&mut self, event: MonitorEvent) -> Option<SessionComplete> {
        match event {
            MonitorEvent::TransferComplete => self.on_transfer_complete(),
            MonitorEvent::PowerWindowElapsed => {
                if self.power.on_elapsed(&mut self.hw.power_pin) {
                    self.telemetry.record(
                        self.session,
                        TelemetryEventKind::PowerReleased,
                        TelemetryPayload::None,
                    );
                }
                None
            }
        }
    }

    fn on_transfer_complete(&mut self) -> Option<SessionComplete> {
        if self.state != SessionState::Active {
            self.telemetry.record(
                self.session,
                TelemetryEventKind::StaleCompletion,
                TelemetryPayload::None,
            );
            return None;
        }

        self.hw.trigger.disable();
        self.hw.converter.stop();
        self.state = SessionState::Idle;
        self.result_valid = true;

        let samples = self.hw.transfer.transferred();
        let average_mv = self.average_mv();
        self.telemetry.record(
            self.session,
            TelemetryEventKind::SessionComplete,
            TelemetryPayload::Completion {
                samples: saturate(samples),
                average_mv,
            },
        );

        Some(SessionComplete {
            session: self.session,
            samples,
            average_mv,
        })
    }

    /// Mean of whatever the buffer currently holds, in millivolts.
    ///
    /// Only meaningful after a completion signal; during a session or after
    /// a stop it mixes data from different sessions.
    #[must_use]
    pub fn average_mv(&self) -> u16 {
        average::average_mv(self.hw.transfer.landed())
    }

    /// Average of the last finished session, or `None` while the buffer is
    /// being refilled or after a session was stopped.
    #[must_use]
    pub fn completed_average_mv(&self) -> Option<u16> {
        self.result_valid.then(|| self.average_mv())
    }

    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.timing.is_some()
    }

    /// Most recently started session (0 before the first start).
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Trigger timing programmed by `initialize`.
    #[must_use]
    pub const fn timing(&self) -> Option<TriggerTiming> {
        self.timing
    }

    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    #[must_use]
    pub const fn power(&self) -> &PowerSequencer {
        &self.power
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    #[must_use]
    pub const fn peripherals(&self) -> &Peripherals<B> {
        &self.hw
    }

    /// Direct driver access, used by simulations and board glue.
    pub fn peripherals_mut(&mut self) -> &mut Peripherals<B> {
        &mut self.hw
    }
}

fn saturate(count: usize) -> u16 {
    u16::try_from(count).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_RAW_CODE;
    use crate::hal::{ClockDomain, OneShotTimer, TimerError};
    use crate::sim::SimBoard;

    fn monitor() -> VoltageMonitor<SimBoard> {
        let mut monitor = VoltageMonitor::new(Peripherals::simulated(), MonitorConfig::default());
        monitor.initialize().expect("simulated board initializes");
        monitor
    }

    #[test]
    fn initialize_configures_without_starting() {
        let monitor = monitor();
        let hw = monitor.peripherals();

        assert!(monitor.is_initialized());
        assert!(ALL_CLOCK_DOMAINS.iter().all(|d| hw.clocks.is_enabled(*d)));
        assert!(hw.router.is_connected(TriggerRoute::TIMER_TO_CONVERTER));
        assert!(!hw.trigger.is_running());
        assert!(!hw.converter.is_converting());
        assert!(!hw.transfer.is_armed());
        assert!(!hw.power_pin.is_high());
        assert_eq!(monitor.timing().map(|t| t.period), Some(655));
        assert_eq!(monitor.state(), SessionState::Idle);
    }

    #[test]
    fn initialize_is_idempotent() {
        let mut monitor = monitor();
        let before = monitor.telemetry().len();
        monitor.initialize().expect("second call succeeds");
        assert_eq!(monitor.telemetry().len(), before);
    }

    #[test]
    fn clock_fault_is_reported_with_peripheral() {
        let mut hw = Peripherals::<SimBoard>::simulated();
        hw.clocks.fail_on(ClockDomain::Converter);
        let mut monitor = VoltageMonitor::new(hw, MonitorConfig::default());

        let err = monitor.initialize().expect_err("clock fault expected");
        assert_eq!(err.peripheral, PeripheralId::Clocks);
        assert_eq!(err.fault, HardwareFault::Absent);
        assert!(!monitor.is_initialized());
        assert_eq!(monitor.start_next(), StartOutcome::Uninitialized);
    }

    #[test]
    fn start_arms_everything_and_powers_sensor() {
        let mut monitor = monitor();
        assert_eq!(monitor.start_next(), StartOutcome::Started(1));

        let hw = monitor.peripherals();
        assert!(hw.converter.is_converting());
        assert!(hw.transfer.is_armed());
        assert!(hw.trigger.is_running());
        assert!(hw.power_pin.is_high());
        assert!(hw.power_timer.is_pending());
        assert!(monitor.is_active());
    }

    #[test]
    fn second_start_is_absorbed() {
        let mut monitor = monitor();
        monitor.start_next();
        let snapshot = monitor.peripherals().snapshot();

        assert_eq!(monitor.start_next(), StartOutcome::AlreadyActive);
        assert_eq!(monitor.peripherals().snapshot(), snapshot);
        assert_eq!(monitor.session(), 1);
        assert_eq!(
            monitor.telemetry().latest().map(|r| r.event),
            Some(TelemetryEventKind::StartIgnored)
        );
    }

    #[test]
    fn completion_stops_chain_and_reports_average() {
        let mut monitor = monitor();
        monitor.start_next();

        let mut signal = None;
        for _ in 0..NUM_OF_SAMPLES {
            signal = monitor.simulate_pulse(MAX_RAW_CODE);
        }

        let complete = signal.expect("completion after full buffer");
        assert_eq!(complete.samples, NUM_OF_SAMPLES);
        assert_eq!(complete.average_mv, 3_300);
        assert_eq!(monitor.state(), SessionState::Idle);
        assert!(!monitor.peripherals().trigger.is_running());
        assert!(!monitor.peripherals().converter.is_converting());
        assert_eq!(monitor.completed_average_mv(), Some(3_300));
    }

    #[test]
    fn completion_while_idle_is_ignored() {
        let mut monitor = monitor();
        assert_eq!(monitor.handle_event(MonitorEvent::TransferComplete), None);
        assert_eq!(
            monitor.telemetry().latest().map(|r| r.event),
            Some(TelemetryEventKind::StaleCompletion)
        );
        assert_eq!(monitor.completed_average_mv(), None);
    }

    #[test]
    fn stop_mid_session_invalidates_result() {
        let mut monitor = monitor();
        monitor.start_next();
        for _ in 0..10 {
            monitor.simulate_pulse(100);
        }

        assert_eq!(
            monitor.stop(),
            StopOutcome::Stopped {
                session: 1,
                transferred: 10
            }
        );
        assert_eq!(
            monitor.telemetry().latest().map(|r| r.details),
            Some(TelemetryPayload::Aborted { samples: 10 })
        );
        assert!(!monitor.peripherals().transfer.is_armed());
        assert_eq!(monitor.completed_average_mv(), None);
        assert_eq!(monitor.stop(), StopOutcome::AlreadyIdle);
    }

    #[test]
    fn retain_policy_leaves_supply_to_the_timer() {
        let mut monitor = monitor();
        monitor.start_next();
        monitor.stop();

        assert!(monitor.peripherals().power_pin.is_high());
        monitor.simulate_elapsed(monitor.config().warmup);
        assert!(!monitor.peripherals().power_pin.is_high());
    }

    #[test]
    fn release_policy_drops_supply_on_stop() {
        let config = MonitorConfig::default().with_stop_power(StopPowerPolicy::Release);
        let mut monitor = VoltageMonitor::new(Peripherals::<SimBoard>::simulated(), config);
        monitor.initialize().unwrap();
        monitor.start_next();
        monitor.stop();

        assert!(!monitor.peripherals().power_pin.is_high());
        assert!(!monitor.peripherals().power_timer.is_pending());
    }

    #[test]
    fn power_schedule_failure_does_not_abort_sampling() {
        let mut monitor = monitor();
        monitor.peripherals_mut().power_timer.reject_next(TimerError::Unavailable);

        let outcome = monitor.start_next();
        assert_eq!(
            outcome,
            StartOutcome::StartedUnpowered {
                session: 1,
                error: PowerError::Schedule(TimerError::Unavailable),
            }
        );
        assert!(outcome.started());
        assert!(monitor.is_active());
        assert!(monitor.peripherals().power_pin.is_high());
    }
}
