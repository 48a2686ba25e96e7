//! Hardware seams for the sampling pipeline.
//!
//! Each block in the trigger chain (clocks, trigger generator, routing fabric,
//! converter, transfer engine, sensor supply and its one-shot timer) is
//! described by a small trait exposing configure/start/stop/status. A [`Board`]
//! names one concrete type per block, and [`Peripherals`] bundles the
//! instances the [`VoltageMonitor`](crate::monitor::VoltageMonitor) owns.
//! Firmware implements the traits on registers; [`sim`](crate::sim) implements
//! them in memory for the emulator and tests.

use core::fmt;
use core::time::Duration;

use crate::buffer::SamplingBuffer;
use crate::config::{ConverterConfig, TRIGGER_ROUTE_CHANNEL, TriggerTiming};

/// Peripheral blocks touched by the pipeline, used in error reports.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PeripheralId {
    Clocks,
    TriggerGenerator,
    SignalRouter,
    Converter,
    TransferEngine,
    PowerOutput,
    PowerTimer,
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PeripheralId::Clocks => "clocks",
            PeripheralId::TriggerGenerator => "trigger-generator",
            PeripheralId::SignalRouter => "signal-router",
            PeripheralId::Converter => "converter",
            PeripheralId::TransferEngine => "transfer-engine",
            PeripheralId::PowerOutput => "power-output",
            PeripheralId::PowerTimer => "power-timer",
        };
        f.write_str(label)
    }
}

/// Failure reported by a peripheral while it is being configured.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HardwareFault {
    /// The block is missing or did not respond.
    Absent,
    /// The requested setting is outside what the block supports.
    Unsupported,
    /// The block did not reach its ready state in time.
    NotReady,
}

impl fmt::Display for HardwareFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareFault::Absent => f.write_str("peripheral absent"),
            HardwareFault::Unsupported => f.write_str("unsupported setting"),
            HardwareFault::NotReady => f.write_str("peripheral not ready"),
        }
    }
}

/// Clock domains that must run before the pipeline is configured.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClockDomain {
    Gpio,
    TriggerTimer,
    SignalRouter,
    Converter,
    Transfer,
}

impl ClockDomain {
    /// Deterministic index for lookups into [`ALL_CLOCK_DOMAINS`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            ClockDomain::Gpio => 0,
            ClockDomain::TriggerTimer => 1,
            ClockDomain::SignalRouter => 2,
            ClockDomain::Converter => 3,
            ClockDomain::Transfer => 4,
        }
    }
}

/// Every clock domain, in the order they are enabled.
pub const ALL_CLOCK_DOMAINS: [ClockDomain; 5] = [
    ClockDomain::Gpio,
    ClockDomain::TriggerTimer,
    ClockDomain::SignalRouter,
    ClockDomain::Converter,
    ClockDomain::Transfer,
];

/// Signal sources a routing channel can listen to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RouteProducer {
    /// Underflow/update pulse of the trigger generator.
    TriggerPulse,
}

/// Inputs a routing channel can drive.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RouteConsumer {
    /// Start-of-conversion input of the converter.
    ConverterStart,
}

/// One hardware connection established by the routing fabric.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TriggerRoute {
    pub channel: u8,
    pub producer: RouteProducer,
    pub consumer: RouteConsumer,
}

impl TriggerRoute {
    /// Timer pulse into the converter trigger on the reserved channel.
    pub const TIMER_TO_CONVERTER: Self = Self {
        channel: TRIGGER_ROUTE_CHANNEL,
        producer: RouteProducer::TriggerPulse,
        consumer: RouteConsumer::ConverterStart,
    };
}

/// Where the transfer engine reads from.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransferSource {
    /// The converter's result queue/data register.
    ConverterResult,
}

/// Request line that paces the transfer engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransferRequest {
    ConverterDataReady,
}

/// Static description of one buffer's worth of transfers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransferConfig {
    pub source: TransferSource,
    pub request: TransferRequest,
    /// Word transfers per session.
    pub count: usize,
    /// Raise the completion interrupt after the final transfer.
    pub interrupt_on_done: bool,
}

/// Logic level of a digital output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

/// Failure to arm a one-shot timer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerError {
    /// No timer slot is available.
    Unavailable,
    /// The delay cannot be represented by the timer.
    InvalidDelay,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerError::Unavailable => f.write_str("no timer slot available"),
            TimerError::InvalidDelay => f.write_str("delay not representable"),
        }
    }
}

/// Enables peripheral clock domains.
pub trait ClockControl {
    /// Turns on `domain`.
    fn enable(&mut self, domain: ClockDomain) -> Result<(), HardwareFault>;

    /// Reports whether `domain` is running.
    fn is_enabled(&self, domain: ClockDomain) -> bool;
}

/// Free-running timer producing the sampling pulses.
pub trait TriggerGenerator {
    /// Width of the hardware counter.
    const COUNTER_BITS: u32;

    /// Frequency of the clock feeding the counter.
    fn source_clock_hz(&self) -> u32;

    /// Programs free-running mode with pulse output, leaving the timer stopped.
    fn configure(&mut self, timing: TriggerTiming) -> Result<(), HardwareFault>;

    /// Starts producing pulses.
    fn enable(&mut self);

    /// Stops producing pulses.
    fn disable(&mut self);

    /// Reports whether pulses are being produced.
    fn is_running(&self) -> bool;
}

/// Fabric forwarding the timer pulse to the converter without the CPU.
pub trait SignalRouter {
    /// Establishes `route`.
    fn connect(&mut self, route: TriggerRoute) -> Result<(), HardwareFault>;

    /// Reports whether `route` is currently wired.
    fn is_connected(&self, route: TriggerRoute) -> bool;
}

/// Analog-to-digital converter fed by routed triggers.
pub trait Converter {
    /// Applies the fixed input, reference, and timing configuration.
    fn configure(&mut self, config: &ConverterConfig) -> Result<(), HardwareFault>;

    /// Issues the begin-conversion command; conversions then follow triggers.
    fn start(&mut self);

    /// Issues the stop-conversion command.
    fn stop(&mut self);

    /// Reports whether the converter accepts triggers.
    fn is_converting(&self) -> bool;
}

/// Autonomous transfer unit copying converter results into the buffer.
pub trait TransferEngine {
    /// Stores the source, request, and count for later sessions.
    fn configure(&mut self, config: TransferConfig) -> Result<(), HardwareFault>;

    /// Arms one buffer's worth of transfers starting at index 0.
    fn arm(&mut self);

    /// Abandons any in-flight transfers.
    fn disarm(&mut self);

    /// Reports whether transfers are still pending.
    fn is_armed(&self) -> bool;

    /// Transfers completed since the last [`arm`](Self::arm).
    fn transferred(&self) -> usize;

    /// Destination buffer as last written by the engine.
    fn landed(&self) -> &SamplingBuffer;
}

/// Digital output powering the sensor.
pub trait PowerOutput {
    /// Configures the pin as a push-pull output at `initial`.
    fn configure(&mut self, initial: Level) -> Result<(), HardwareFault>;

    fn set_high(&mut self);

    fn set_low(&mut self);

    fn level(&self) -> Level;

    fn is_high(&self) -> bool {
        self.level() == Level::High
    }
}

/// One-shot timer delivering a single elapsed event after a delay.
pub trait OneShotTimer {
    /// Arms the timer; an already pending timer is restarted.
    fn schedule(&mut self, delay: Duration) -> Result<(), TimerError>;

    /// Disarms the timer if it has not fired yet.
    fn cancel(&mut self);

    /// Reports whether an elapsed event is still outstanding.
    fn is_pending(&self) -> bool;
}

/// Concrete peripheral types for one target.
pub trait Board {
    type Clocks: ClockControl;
    type Trigger: TriggerGenerator;
    type Router: SignalRouter;
    type Converter: Converter;
    type Transfer: TransferEngine;
    type PowerPin: PowerOutput;
    type PowerTimer: OneShotTimer;
}

/// Peripheral instances owned by a monitor.
pub struct Peripherals<B: Board> {
    pub clocks: B::Clocks,
    pub trigger: B::Trigger,
    pub router: B::Router,
    pub converter: B::Converter,
    pub transfer: B::Transfer,
    pub power_pin: B::PowerPin,
    pub power_timer: B::PowerTimer,
}

impl<B: Board> Peripherals<B> {
    /// Bundles the individual drivers.
    pub fn new(
        clocks: B::Clocks,
        trigger: B::Trigger,
        router: B::Router,
        converter: B::Converter,
        transfer: B::Transfer,
        power_pin: B::PowerPin,
        power_timer: B::PowerTimer,
    ) -> Self {
        Self {
            clocks,
            trigger,
            router,
            converter,
            transfer,
            power_pin,
            power_timer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_domain_indices_follow_enable_order() {
        for (index, domain) in ALL_CLOCK_DOMAINS.iter().enumerate() {
            assert_eq!(domain.as_index(), index);
        }
    }

    #[test]
    fn timer_route_uses_reserved_channel() {
        let route = TriggerRoute::TIMER_TO_CONVERTER;
        assert_eq!(route.channel, TRIGGER_ROUTE_CHANNEL);
        assert_eq!(route.producer, RouteProducer::TriggerPulse);
        assert_eq!(route.consumer, RouteConsumer::ConverterStart);
    }
}
