//! Sensor supply on PA1 and the one-shot timer that switches it off.
//!
//! [`PowerWindowTimer`] only hands the delay to [`run`]; the embassy timer
//! wait happens in that task, which reports
//! [`MonitorEvent::PowerWindowElapsed`] back to the monitor task.

#![cfg(target_os = "none")]

use core::time::Duration;

use embassy_futures::select::{Either, select};
use embassy_stm32::gpio::{self, Output};
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use monitor_core::hal::{HardwareFault, Level, OneShotTimer, PowerOutput, TimerError};
use monitor_core::monitor::MonitorEvent;
use portable_atomic::{AtomicBool, Ordering};

use crate::monitor::{EventSender, MonitorMutex};

/// Push-pull output driving the sensor supply.
pub struct SensorPowerPin {
    pin: Output<'static>,
}

impl SensorPowerPin {
    pub fn new(pin: Output<'static>) -> Self {
        Self { pin }
    }
}

impl PowerOutput for SensorPowerPin {
    fn configure(&mut self, initial: Level) -> Result<(), HardwareFault> {
        self.pin.set_level(match initial {
            Level::Low => gpio::Level::Low,
            Level::High => gpio::Level::High,
        });
        Ok(())
    }

    fn set_high(&mut self) {
        self.pin.set_high();
    }

    fn set_low(&mut self) {
        self.pin.set_low();
    }

    fn level(&self) -> Level {
        if self.pin.is_set_high() {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Requests for the power timer task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerControl {
    Schedule(embassy_time::Duration),
    Cancel,
}

pub type PowerSignal = Signal<MonitorMutex, PowerControl>;

pub static POWER_CONTROL: PowerSignal = Signal::new();
static PENDING: AtomicBool = AtomicBool::new(false);

/// One-shot timer backed by the embassy time driver.
#[derive(Default)]
pub struct PowerWindowTimer;

impl OneShotTimer for PowerWindowTimer {
    fn schedule(&mut self, delay: Duration) -> Result<(), TimerError> {
        let micros = u64::try_from(delay.as_micros()).map_err(|_| TimerError::InvalidDelay)?;
        if micros == 0 {
            return Err(TimerError::InvalidDelay);
        }
        PENDING.store(true, Ordering::Release);
        POWER_CONTROL.signal(PowerControl::Schedule(
            embassy_time::Duration::from_micros(micros),
        ));
        Ok(())
    }

    fn cancel(&mut self) {
        PENDING.store(false, Ordering::Release);
        POWER_CONTROL.signal(PowerControl::Cancel);
    }

    fn is_pending(&self) -> bool {
        PENDING.load(Ordering::Acquire)
    }
}

/// Waits out each scheduled window; a newer request replaces the current one.
pub async fn run(events: EventSender<'static>) -> ! {
    let mut pending = None;
    loop {
        let control = match pending.take() {
            Some(control) => control,
            None => POWER_CONTROL.wait().await,
        };
        let PowerControl::Schedule(delay) = control else {
            continue;
        };

        match select(Timer::after(delay), POWER_CONTROL.wait()).await {
            Either::First(()) => {
                PENDING.store(false, Ordering::Release);
                events.send(MonitorEvent::PowerWindowElapsed).await;
            }
            Either::Second(next) => pending = Some(next),
        }
    }
}
