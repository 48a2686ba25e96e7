//! TIM3 as the free-running sampling trigger.

#![cfg(target_os = "none")]

use embassy_stm32::Peri;
use embassy_stm32::pac;
use embassy_stm32::peripherals::TIM3;
use monitor_core::config::TriggerTiming;
use monitor_core::hal::{HardwareFault, TriggerGenerator};

/// TIM3 kernel clock with the default HSI16 tree and APB prescaler 1.
pub const TIM3_CLOCK_HZ: u32 = 16_000_000;

pub struct Tim3Trigger {
    _timer: Peri<'static, TIM3>,
    running: bool,
}

impl Tim3Trigger {
    pub fn new(timer: Peri<'static, TIM3>) -> Self {
        Self {
            _timer: timer,
            running: false,
        }
    }
}

impl TriggerGenerator for Tim3Trigger {
    const COUNTER_BITS: u32 = 16;

    fn source_clock_hz(&self) -> u32 {
        TIM3_CLOCK_HZ
    }

    fn configure(&mut self, timing: TriggerTiming) -> Result<(), HardwareFault> {
        let prescaler = timing
            .prescaler
            .checked_sub(1)
            .and_then(|value| u16::try_from(value).ok())
            .ok_or(HardwareFault::Unsupported)?;
        let reload = u16::try_from(timing.reload()).map_err(|_| HardwareFault::Unsupported)?;

        let tim = pac::TIM3;
        tim.cr1().modify(|w| w.set_cen(false));
        tim.psc().write_value(prescaler);
        tim.arr().write(|w| w.set_arr(reload));
        // Latch PSC/ARR; TRGO is not routed yet, so this update goes nowhere.
        tim.cr1().modify(|w| w.set_urs(pac::timer::vals::Urs::COUNTER_ONLY));
        tim.egr().write(|w| w.set_ug(true));
        self.running = false;
        Ok(())
    }

    fn enable(&mut self) {
        pac::TIM3.cr1().modify(|w| w.set_cen(true));
        self.running = true;
    }

    fn disable(&mut self) {
        pac::TIM3.cr1().modify(|w| w.set_cen(false));
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }
}
