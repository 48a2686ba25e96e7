//! STM32G0B1 drivers behind the `monitor-core` peripheral traits.
//!
//! TIM3 update events leave the timer on TRGO and start ADC1 conversions
//! (EXTSEL = TRG3). Each result raises a DMAMUX request that DMA1 channel 1
//! copies into the sampling buffer. The DMA and power timer completions are
//! awaited by dedicated tasks and forwarded to the monitor task as events.

#![cfg(target_os = "none")]

pub mod adc;
pub mod dma;
pub mod power;
pub mod timer;

use embassy_stm32::pac;
use monitor_core::hal::{
    Board, ClockControl, ClockDomain, HardwareFault, RouteConsumer, RouteProducer, SignalRouter,
    TriggerRoute,
};

pub use adc::Adc1Converter;
pub use dma::DmaTransfer;
pub use power::{PowerWindowTimer, SensorPowerPin};
pub use timer::Tim3Trigger;

/// ADC EXTSEL code selecting TIM3_TRGO on STM32G0.
const EXTSEL_TIM3_TRGO: u8 = 0b011;

/// The voltage monitor wired to the STM32G0B1 peripherals.
pub struct G0Board;

impl Board for G0Board {
    type Clocks = RccClocks;
    type Trigger = Tim3Trigger;
    type Router = TriggerRouter;
    type Converter = Adc1Converter;
    type Transfer = DmaTransfer;
    type PowerPin = SensorPowerPin;
    type PowerTimer = PowerWindowTimer;
}

/// Peripheral clock gates in RCC.
pub struct RccClocks;

impl ClockControl for RccClocks {
    fn enable(&mut self, domain: ClockDomain) -> Result<(), HardwareFault> {
        let rcc = pac::RCC;
        match domain {
            ClockDomain::Gpio => rcc.iopenr().modify(|w| w.set_gpioaen(true)),
            ClockDomain::TriggerTimer => rcc.apbenr1().modify(|w| w.set_tim3en(true)),
            ClockDomain::SignalRouter => rcc.apbenr2().modify(|w| w.set_syscfgen(true)),
            ClockDomain::Converter => rcc.apbenr2().modify(|w| w.set_adcen(true)),
            ClockDomain::Transfer => rcc.ahbenr().modify(|w| w.set_dma1en(true)),
        }

        if self.is_enabled(domain) {
            Ok(())
        } else {
            Err(HardwareFault::NotReady)
        }
    }

    fn is_enabled(&self, domain: ClockDomain) -> bool {
        let rcc = pac::RCC;
        match domain {
            ClockDomain::Gpio => rcc.iopenr().read().gpioaen(),
            ClockDomain::TriggerTimer => rcc.apbenr1().read().tim3en(),
            ClockDomain::SignalRouter => rcc.apbenr2().read().syscfgen(),
            ClockDomain::Converter => rcc.apbenr2().read().adcen(),
            ClockDomain::Transfer => rcc.ahbenr().read().dma1en(),
        }
    }
}

/// TIM3 TRGO into the ADC external trigger input.
///
/// The path is hardwired on the G0, so "routing" means selecting the update
/// event as TRGO and TRG3 as the ADC trigger on its rising edge.
#[derive(Default)]
pub struct TriggerRouter {
    connected: Option<TriggerRoute>,
}

impl SignalRouter for TriggerRouter {
    fn connect(&mut self, route: TriggerRoute) -> Result<(), HardwareFault> {
        if route.producer != RouteProducer::TriggerPulse
            || route.consumer != RouteConsumer::ConverterStart
        {
            return Err(HardwareFault::Unsupported);
        }

        pac::TIM3
            .cr2()
            .modify(|w| w.set_mms(pac::timer::vals::Mms::UPDATE));
        pac::ADC1.cfgr1().modify(|w| {
            w.set_extsel(EXTSEL_TIM3_TRGO);
            w.set_exten(pac::adc::vals::Exten::RISING_EDGE);
        });

        self.connected = Some(route);
        Ok(())
    }

    fn is_connected(&self, route: TriggerRoute) -> bool {
        self.connected == Some(route)
    }
}
