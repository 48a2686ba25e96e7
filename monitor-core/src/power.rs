//! Sensor supply sequencing.
//!
//! Every session raises the supply and arms a one-shot timer; when the timer
//! fires the supply drops again. The state machine never lowers the supply on
//! its own unless the board opts into [`StopPowerPolicy::Release`].
//!
//! [`StopPowerPolicy::Release`]: crate::config::StopPowerPolicy::Release

use core::fmt;
use core::time::Duration;

use crate::hal::{OneShotTimer, PowerOutput, TimerError};

/// Failure while opening a power window.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PowerError {
    /// The supply went high but the release timer could not be armed, so it
    /// stays high until the next successful window.
    Schedule(TimerError),
}

impl fmt::Display for PowerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerError::Schedule(err) => write!(f, "power window not scheduled: {err}"),
        }
    }
}

/// An open power window: supply high, release timer armed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PowerWindow {
    /// Delay the release timer was armed with.
    pub hold: Duration,
    /// Windows opened before this one (including those that were restarted).
    pub sequence: u32,
}

/// Drives the sensor supply around each session.
#[derive(Clone, Debug)]
pub struct PowerSequencer {
    warmup: Duration,
    window: Option<PowerWindow>,
    opened: u32,
}

impl PowerSequencer {
    #[must_use]
    pub const fn new(warmup: Duration) -> Self {
        Self {
            warmup,
            window: None,
            opened: 0,
        }
    }

    /// Delay between raising and releasing the supply.
    #[must_use]
    pub const fn warmup(&self) -> Duration {
        self.warmup
    }

    /// Window currently waiting for its timer, if any.
    #[must_use]
    pub const fn window(&self) -> Option<&PowerWindow> {
        self.window.as_ref()
    }

    /// Raises the supply and arms the release timer.
    ///
    /// Opening a window while another is pending restarts the timer; there is
    /// no separate cancellation step.
    pub fn engage<O, T>(&mut self, output: &mut O, timer: &mut T) -> Result<(), PowerError>
    where
        O: PowerOutput,
        T: OneShotTimer,
    {
        output.set_high();
        timer.schedule(self.warmup).map_err(PowerError::Schedule)?;

        self.window = Some(PowerWindow {
            hold: self.warmup,
            sequence: self.opened,
        });
        self.opened = self.opened.wrapping_add(1);
        Ok(())
    }

    /// Handles the release timer firing. Returns `true` when a window closed.
    pub fn on_elapsed<O>(&mut self, output: &mut O) -> bool
    where
        O: PowerOutput,
    {
        output.set_low();
        self.window.take().is_some()
    }

    /// Closes any window immediately and drives the supply low.
    pub fn release<O, T>(&mut self, output: &mut O, timer: &mut T) -> bool
    where
        O: PowerOutput,
        T: OneShotTimer,
    {
        timer.cancel();
        output.set_low();
        self.window.take().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::Level;

    #[derive(Default)]
    struct Pin {
        high: bool,
    }

    impl PowerOutput for Pin {
        fn configure(&mut self, initial: Level) -> Result<(), crate::hal::HardwareFault> {
            self.high = initial == Level::High;
            Ok(())
        }

        fn set_high(&mut self) {
            self.high = true;
        }

        fn set_low(&mut self) {
            self.high = false;
        }

        fn level(&self) -> Level {
            if self.high { Level::High } else { Level::Low }
        }
    }

    #[derive(Default)]
    struct Timer {
        armed: Option<Duration>,
        reject: bool,
    }

    impl OneShotTimer for Timer {
        fn schedule(&mut self, delay: Duration) -> Result<(), TimerError> {
            if self.reject {
                return Err(TimerError::Unavailable);
            }
            self.armed = Some(delay);
            Ok(())
        }

        fn cancel(&mut self) {
            self.armed = None;
        }

        fn is_pending(&self) -> bool {
            self.armed.is_some()
        }
    }

    #[test]
    fn engage_raises_supply_and_arms_timer() {
        let mut sequencer = PowerSequencer::new(Duration::from_micros(152));
        let mut pin = Pin::default();
        let mut timer = Timer::default();

        sequencer
            .engage(&mut pin, &mut timer)
            .expect("window should open");

        assert!(pin.is_high());
        assert_eq!(timer.armed, Some(Duration::from_micros(152)));
        assert_eq!(sequencer.window().map(|window| window.sequence), Some(0));

        assert!(sequencer.on_elapsed(&mut pin));
        assert!(!pin.is_high());
        assert!(sequencer.window().is_none());
    }

    #[test]
    fn schedule_failure_leaves_supply_high() {
        let mut sequencer = PowerSequencer::new(Duration::from_micros(152));
        let mut pin = Pin::default();
        let mut timer = Timer {
            reject: true,
            ..Timer::default()
        };

        let result = sequencer.engage(&mut pin, &mut timer);
        assert_eq!(result, Err(PowerError::Schedule(TimerError::Unavailable)));
        assert!(pin.is_high());
        assert!(sequencer.window().is_none());
    }

    #[test]
    fn reengaging_restarts_the_window() {
        let mut sequencer = PowerSequencer::new(Duration::from_millis(1));
        let mut pin = Pin::default();
        let mut timer = Timer::default();

        sequencer.engage(&mut pin, &mut timer).unwrap();
        sequencer.engage(&mut pin, &mut timer).unwrap();
        assert_eq!(sequencer.window().map(|window| window.sequence), Some(1));

        assert!(sequencer.release(&mut pin, &mut timer));
        assert!(!timer.is_pending());
        assert!(!pin.is_high());
        assert!(!sequencer.on_elapsed(&mut pin));
    }
}
