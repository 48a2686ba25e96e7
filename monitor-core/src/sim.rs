//! In-memory board used by the emulator and the tests.
//!
//! The simulated blocks keep just enough state to reproduce the trigger chain:
//! a pulse only produces a sample when the trigger generator runs, the route
//! is wired and the converter accepts triggers, and only an armed transfer
//! engine stores it. Time is advanced explicitly.

use core::time::Duration;

use crate::buffer::SamplingBuffer;
use crate::config::{
    ADC_RESOLUTION_BITS, ConverterConfig, TRIGGER_SOURCE_CLOCK_HZ, TriggerTiming,
};
use crate::hal::{
    ALL_CLOCK_DOMAINS, Board, ClockControl, ClockDomain, Converter, HardwareFault, Level,
    OneShotTimer, Peripherals, PowerOutput, SignalRouter, TimerError, TransferConfig,
    TransferEngine, TriggerGenerator, TriggerRoute,
};
use crate::monitor::{MonitorEvent, SessionComplete, VoltageMonitor};

/// Board whose peripherals live entirely in memory.
pub struct SimBoard;

impl Board for SimBoard {
    type Clocks = SimClocks;
    type Trigger = SimTrigger;
    type Router = SimRouter;
    type Converter = SimConverter;
    type Transfer = SimTransfer;
    type PowerPin = SimPowerPin;
    type PowerTimer = SimPowerTimer;
}

#[derive(Clone, Debug, Default)]
pub struct SimClocks {
    enabled: [bool; ALL_CLOCK_DOMAINS.len()],
    failing: Option<ClockDomain>,
}

impl SimClocks {
    /// Makes enabling `domain` fail with [`HardwareFault::Absent`].
    pub fn fail_on(&mut self, domain: ClockDomain) {
        self.failing = Some(domain);
    }
}

impl ClockControl for SimClocks {
    fn enable(&mut self, domain: ClockDomain) -> Result<(), HardwareFault> {
        if self.failing == Some(domain) {
            return Err(HardwareFault::Absent);
        }
        self.enabled[domain.as_index()] = true;
        Ok(())
    }

    fn is_enabled(&self, domain: ClockDomain) -> bool {
        self.enabled[domain.as_index()]
    }
}

/// 24-bit down-counter clocked from the 32.768 kHz crystal.
#[derive(Clone, Debug, Default)]
pub struct SimTrigger {
    timing: Option<TriggerTiming>,
    running: bool,
    pulses: u32,
}

impl SimTrigger {
    #[must_use]
    pub const fn timing(&self) -> Option<TriggerTiming> {
        self.timing
    }

    /// Pulses produced since reset.
    #[must_use]
    pub const fn pulses(&self) -> u32 {
        self.pulses
    }
}

impl TriggerGenerator for SimTrigger {
    const COUNTER_BITS: u32 = 24;

    fn source_clock_hz(&self) -> u32 {
        TRIGGER_SOURCE_CLOCK_HZ
    }

    fn configure(&mut self, timing: TriggerTiming) -> Result<(), HardwareFault> {
        if timing.period == 0 || timing.period > 1 << Self::COUNTER_BITS {
            return Err(HardwareFault::Unsupported);
        }
        self.timing = Some(timing);
        self.running = false;
        Ok(())
    }

    fn enable(&mut self) {
        self.running = self.timing.is_some();
    }

    fn disable(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

#[derive(Clone, Debug, Default)]
pub struct SimRouter {
    route: Option<TriggerRoute>,
}

impl SignalRouter for SimRouter {
    fn connect(&mut self, route: TriggerRoute) -> Result<(), HardwareFault> {
        self.route = Some(route);
        Ok(())
    }

    fn is_connected(&self, route: TriggerRoute) -> bool {
        self.route == Some(route)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SimConverter {
    config: Option<ConverterConfig>,
    converting: bool,
    conversions: u32,
}

impl SimConverter {
    #[must_use]
    pub const fn config(&self) -> Option<&ConverterConfig> {
        self.config.as_ref()
    }

    #[must_use]
    pub const fn conversions(&self) -> u32 {
        self.conversions
    }
}

impl Converter for SimConverter {
    fn configure(&mut self, config: &ConverterConfig) -> Result<(), HardwareFault> {
        if config.resolution_bits != ADC_RESOLUTION_BITS
            || config.adc_clock_hz > config.source_clock_hz
        {
            return Err(HardwareFault::Unsupported);
        }
        self.config = Some(*config);
        Ok(())
    }

    fn start(&mut self) {
        self.converting = self.config.is_some();
    }

    fn stop(&mut self) {
        self.converting = false;
    }

    fn is_converting(&self) -> bool {
        self.converting
    }
}

/// Transfer engine that owns its destination buffer.
#[derive(Clone, Debug, Default)]
pub struct SimTransfer {
    config: Option<TransferConfig>,
    armed: bool,
    index: usize,
    buffer: SamplingBuffer,
}

impl SimTransfer {
    /// Copies one converter result; returns the completion interrupt when the
    /// configured count has been reached.
    pub fn push(&mut self, raw: u32) -> Option<MonitorEvent> {
        let config = self.config?;
        if !self.armed {
            return None;
        }

        if self.buffer.store(self.index, raw) {
            self.index += 1;
        }
        if self.index < config.count {
            return None;
        }

        self.armed = false;
        config
            .interrupt_on_done
            .then_some(MonitorEvent::TransferComplete)
    }
}

impl TransferEngine for SimTransfer {
    fn configure(&mut self, config: TransferConfig) -> Result<(), HardwareFault> {
        if config.count == 0 || config.count > self.buffer.len() {
            return Err(HardwareFault::Unsupported);
        }
        self.config = Some(config);
        Ok(())
    }

    fn arm(&mut self) {
        self.armed = self.config.is_some();
        self.index = 0;
    }

    fn disarm(&mut self) {
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }

    fn transferred(&self) -> usize {
        self.index
    }

    fn landed(&self) -> &SamplingBuffer {
        &self.buffer
    }
}

#[derive(Clone, Debug)]
pub struct SimPowerPin {
    level: Level,
    transitions: u32,
}

impl SimPowerPin {
    /// Level changes seen since reset.
    #[must_use]
    pub const fn transitions(&self) -> u32 {
        self.transitions
    }

    fn drive(&mut self, level: Level) {
        if self.level != level {
            self.transitions = self.transitions.wrapping_add(1);
        }
        self.level = level;
    }
}

impl Default for SimPowerPin {
    fn default() -> Self {
        Self {
            level: Level::Low,
            transitions: 0,
        }
    }
}

impl PowerOutput for SimPowerPin {
    fn configure(&mut self, initial: Level) -> Result<(), HardwareFault> {
        self.level = initial;
        Ok(())
    }

    fn set_high(&mut self) {
        self.drive(Level::High);
    }

    fn set_low(&mut self) {
        self.drive(Level::Low);
    }

    fn level(&self) -> Level {
        self.level
    }
}

/// One-shot timer counting down simulated time.
#[derive(Clone, Debug, Default)]
pub struct SimPowerTimer {
    remaining: Option<Duration>,
    reject: Option<TimerError>,
}

impl SimPowerTimer {
    /// Makes the next `schedule` call fail with `error`.
    pub fn reject_next(&mut self, error: TimerError) {
        self.reject = Some(error);
    }

    /// Time left before the elapsed event.
    #[must_use]
    pub const fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    /// Advances the timer, returning `true` when it fired.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        match self.remaining {
            Some(left) if elapsed >= left => {
                self.remaining = None;
                true
            }
            Some(left) => {
                self.remaining = Some(left - elapsed);
                false
            }
            None => false,
        }
    }
}

impl OneShotTimer for SimPowerTimer {
    fn schedule(&mut self, delay: Duration) -> Result<(), TimerError> {
        if let Some(error) = self.reject.take() {
            return Err(error);
        }
        if delay.is_zero() {
            return Err(TimerError::InvalidDelay);
        }
        self.remaining = Some(delay);
        Ok(())
    }

    fn cancel(&mut self) {
        self.remaining = None;
    }

    fn is_pending(&self) -> bool {
        self.remaining.is_some()
    }
}

/// Observable hardware state, compared by the idempotence checks.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct SimSnapshot {
    pub trigger_running: bool,
    pub converting: bool,
    pub transfer_armed: bool,
    pub transferred: usize,
    pub power: Level,
    pub power_remaining: Option<Duration>,
}

impl Peripherals<SimBoard> {
    /// Fresh, unconfigured simulated peripherals.
    #[must_use]
    pub fn simulated() -> Self {
        Self::new(
            SimClocks::default(),
            SimTrigger::default(),
            SimRouter::default(),
            SimConverter::default(),
            SimTransfer::default(),
            SimPowerPin::default(),
            SimPowerTimer::default(),
        )
    }

    /// Emits one trigger pulse whose conversion yields `raw`.
    pub fn pulse(&mut self, raw: u32) -> Option<MonitorEvent> {
        if !self.trigger.is_running() {
            return None;
        }
        self.trigger.pulses = self.trigger.pulses.wrapping_add(1);

        if !self.router.is_connected(TriggerRoute::TIMER_TO_CONVERTER)
            || !self.converter.is_converting()
        {
            return None;
        }
        self.converter.conversions = self.converter.conversions.wrapping_add(1);

        self.transfer.push(raw)
    }

    /// Lets `elapsed` of simulated time pass for the power timer.
    pub fn advance(&mut self, elapsed: Duration) -> Option<MonitorEvent> {
        self.power_timer
            .advance(elapsed)
            .then_some(MonitorEvent::PowerWindowElapsed)
    }

    #[must_use]
    pub fn snapshot(&self) -> SimSnapshot {
        SimSnapshot {
            trigger_running: self.trigger.is_running(),
            converting: self.converter.is_converting(),
            transfer_armed: self.transfer.is_armed(),
            transferred: self.transfer.transferred(),
            power: self.power_pin.level(),
            power_remaining: self.power_timer.remaining(),
        }
    }
}

impl VoltageMonitor<SimBoard> {
    /// Feeds one pulse through the simulated chain and handles any
    /// resulting interrupt.
    pub fn simulate_pulse(&mut self, raw: u32) -> Option<SessionComplete> {
        let event = self.peripherals_mut().pulse(raw)?;
        self.handle_event(event)
    }

    /// Advances simulated time; returns `true` when the power window closed.
    pub fn simulate_elapsed(&mut self, elapsed: Duration) -> bool {
        match self.peripherals_mut().advance(elapsed) {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NUM_OF_SAMPLES;
    use crate::hal::{TransferRequest, TransferSource};

    fn transfer(count: usize) -> SimTransfer {
        let mut transfer = SimTransfer::default();
        transfer
            .configure(TransferConfig {
                source: TransferSource::ConverterResult,
                request: TransferRequest::ConverterDataReady,
                count,
                interrupt_on_done: true,
            })
            .unwrap();
        transfer
    }

    #[test]
    fn unarmed_transfer_drops_results() {
        let mut transfer = transfer(NUM_OF_SAMPLES);
        assert_eq!(transfer.push(5), None);
        assert_eq!(transfer.transferred(), 0);
    }

    #[test]
    fn transfer_interrupts_once_at_count() {
        let mut transfer = transfer(3);
        transfer.arm();
        assert_eq!(transfer.push(1), None);
        assert_eq!(transfer.push(2), None);
        assert_eq!(transfer.push(3), Some(MonitorEvent::TransferComplete));
        assert!(!transfer.is_armed());
        assert_eq!(transfer.push(4), None);
        assert_eq!(&transfer.landed().as_slice()[..4], &[1, 2, 3, 0]);
    }

    #[test]
    fn oversized_count_is_rejected() {
        let mut transfer = SimTransfer::default();
        let result = transfer.configure(TransferConfig {
            source: TransferSource::ConverterResult,
            request: TransferRequest::ConverterDataReady,
            count: NUM_OF_SAMPLES + 1,
            interrupt_on_done: true,
        });
        assert_eq!(result, Err(HardwareFault::Unsupported));
    }

    #[test]
    fn pulse_needs_the_whole_chain() {
        let mut hw = Peripherals::<SimBoard>::simulated();
        hw.trigger
            .configure(TriggerTiming {
                prescaler: 1,
                period: 655,
            })
            .unwrap();
        hw.converter.configure(&ConverterConfig::default()).unwrap();
        hw.trigger.enable();
        hw.converter.start();

        assert_eq!(hw.pulse(1), None);
        assert_eq!(hw.trigger.pulses(), 1);
        assert_eq!(hw.converter.conversions(), 0);

        hw.router.connect(TriggerRoute::TIMER_TO_CONVERTER).unwrap();
        hw.pulse(1);
        assert_eq!(hw.converter.conversions(), 1);
    }

    #[test]
    fn timer_fires_after_full_delay() {
        let mut timer = SimPowerTimer::default();
        timer.schedule(Duration::from_micros(152)).unwrap();
        assert!(!timer.advance(Duration::from_micros(100)));
        assert_eq!(timer.remaining(), Some(Duration::from_micros(52)));
        assert!(timer.advance(Duration::from_micros(52)));
        assert!(!timer.is_pending());
        assert!(!timer.advance(Duration::from_secs(1)));
    }

    #[test]
    fn rejection_applies_to_one_schedule() {
        let mut timer = SimPowerTimer::default();
        timer.reject_next(TimerError::Unavailable);
        assert_eq!(
            timer.schedule(Duration::from_millis(1)),
            Err(TimerError::Unavailable)
        );
        assert_eq!(timer.schedule(Duration::from_millis(1)), Ok(()));
    }
}
