//! Compile-time sampling constants and the derived peripheral settings.
//!
//! Sample count and sampling rate are fixed at build time; the structures in
//! this module only carry values that follow from them (timer division,
//! converter clocks) plus the board-level choices a target may override, such
//! as the converter input pin or what `stop()` does to the sensor supply.

use core::time::Duration;

/// Number of conversions captured per session before the average is computed.
pub const NUM_OF_SAMPLES: usize = 128;

/// Rate at which the trigger generator fires conversions.
pub const SAMPLING_FREQ_HZ: u32 = 50;

/// Converter full-scale voltage, equal to the supply reference.
pub const FULL_SCALE_MV: u32 = 3_300;

/// Converter resolution.
pub const ADC_RESOLUTION_BITS: u32 = 12;

/// Largest raw code the converter produces (`0xFFF` for 12 bits).
pub const MAX_RAW_CODE: u32 = (1 << ADC_RESOLUTION_BITS) - 1;

/// Frequency of the low-power crystal clocking the trigger timer.
pub const TRIGGER_SOURCE_CLOCK_HZ: u32 = 32_768;

/// Frequency of the sleep timer used for the sensor power window.
pub const SLEEP_TIMER_HZ: u32 = 32_768;

/// Sleep-timer ticks the sensor supply stays high after a session starts.
pub const POWER_WINDOW_TICKS: u32 = 5;

/// Sensor warm-up delay (five 32.768 kHz ticks, roughly 152 µs).
pub const SENSOR_WARMUP: Duration =
    Duration::from_micros(POWER_WINDOW_TICKS as u64 * 1_000_000 / SLEEP_TIMER_HZ as u64);

/// Converter source clock target; the largest source division is by four.
pub const CONVERTER_SOURCE_CLOCK_HZ: u32 = 5_000_000;

/// Converter sampling clock target.
pub const CONVERTER_CLOCK_HZ: u32 = 1_000_000;

/// Routing channel reserved for the timer → converter trigger.
pub const TRIGGER_ROUTE_CHANNEL: u8 = 1;

/// Interval between two trigger pulses.
pub const SAMPLE_PERIOD: Duration = Duration::from_micros(1_000_000 / SAMPLING_FREQ_HZ as u64);

/// Prescaler and period programmed into the trigger generator.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TriggerTiming {
    /// Source clock divider (1 = undivided).
    pub prescaler: u32,
    /// Divided clock counts between two pulses.
    pub period: u32,
}

impl TriggerTiming {
    /// Derives the timer setting for `target_hz` from a `source_hz` clock and a
    /// counter `counter_bits` wide.
    ///
    /// The division truncates, so the achieved rate may sit slightly above the
    /// target. Returns `None` when the target cannot be produced at all.
    #[must_use]
    pub const fn derive(source_hz: u32, target_hz: u32, counter_bits: u32) -> Option<Self> {
        if target_hz == 0 || counter_bits == 0 {
            return None;
        }

        let ticks = source_hz / target_hz;
        if ticks == 0 {
            return None;
        }

        let max_period = if counter_bits >= 32 {
            u32::MAX
        } else {
            1 << counter_bits
        };
        let prescaler = ticks.div_ceil(max_period);
        let period = ticks / prescaler;

        Some(Self { prescaler, period })
    }

    /// Value loaded into an auto-reload register that counts `0..=reload`.
    #[must_use]
    pub const fn reload(self) -> u32 {
        self.period.saturating_sub(1)
    }

    /// Pulse rate produced from `source_hz` with this setting.
    #[must_use]
    pub const fn achieved_hz(self, source_hz: u32) -> u32 {
        match self.prescaler.checked_mul(self.period) {
            Some(0) | None => 0,
            Some(divisor) => source_hz / divisor,
        }
    }
}

/// Voltage reference selected for the converter.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VoltageReference {
    /// Unbuffered analog supply; full scale equals [`FULL_SCALE_MV`].
    Supply,
    /// Internal bandgap reference.
    Internal,
}

/// Converter warm-up behaviour between conversions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum WarmupMode {
    /// Power down between conversions and warm up on each trigger.
    Normal,
    /// Keep the converter warm between triggers.
    KeepWarm,
}

/// What the converter does when a routed trigger arrives.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TriggerAction {
    /// Perform exactly one conversion per pulse.
    Once,
    /// Convert continuously after the first pulse.
    Continuous,
}

/// Fixed converter configuration applied once during initialisation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ConverterConfig {
    /// Single-ended positive input channel; the negative input is ground.
    pub channel: u8,
    /// Board pin wired to the sensor output.
    pub pin: &'static str,
    pub reference: VoltageReference,
    pub warmup: WarmupMode,
    pub trigger_action: TriggerAction,
    pub source_clock_hz: u32,
    pub adc_clock_hz: u32,
    pub resolution_bits: u32,
    /// Request a transfer as soon as one result is queued.
    pub transfer_on_result: bool,
}

impl ConverterConfig {
    /// Configuration used by the reference board.
    #[must_use]
    pub const fn new(channel: u8, pin: &'static str) -> Self {
        Self {
            channel,
            pin,
            reference: VoltageReference::Supply,
            warmup: WarmupMode::Normal,
            trigger_action: TriggerAction::Once,
            source_clock_hz: CONVERTER_SOURCE_CLOCK_HZ,
            adc_clock_hz: CONVERTER_CLOCK_HZ,
            resolution_bits: ADC_RESOLUTION_BITS,
            transfer_on_result: true,
        }
    }
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self::new(0, "PA0")
    }
}

/// Effect of `stop()` on the sensor supply.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum StopPowerPolicy {
    /// Leave the supply to the power window timer (legacy behaviour).
    #[default]
    Retain,
    /// Cancel the power window and drive the supply low immediately.
    Release,
}

/// Board-level options for a [`VoltageMonitor`](crate::monitor::VoltageMonitor).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MonitorConfig {
    pub converter: ConverterConfig,
    /// How long the sensor supply stays high after a session starts.
    pub warmup: Duration,
    pub stop_power: StopPowerPolicy,
}

impl MonitorConfig {
    #[must_use]
    pub const fn new(converter: ConverterConfig) -> Self {
        Self {
            converter,
            warmup: SENSOR_WARMUP,
            stop_power: StopPowerPolicy::Retain,
        }
    }

    /// Returns a copy with the given stop policy.
    #[must_use]
    pub const fn with_stop_power(mut self, policy: StopPowerPolicy) -> Self {
        self.stop_power = policy;
        self
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new(ConverterConfig::default())
    }
}
