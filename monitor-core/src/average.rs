//! Millivolt conversion and averaging over a captured buffer.

use crate::buffer::SamplingBuffer;
use crate::config::{FULL_SCALE_MV, MAX_RAW_CODE};

/// Converts one raw converter code to millivolts, truncating.
#[must_use]
pub const fn raw_to_mv(raw: u32) -> u32 {
    // Widen so out-of-range words cannot overflow the product.
    let scaled = raw as u64 * FULL_SCALE_MV as u64 / MAX_RAW_CODE as u64;
    if scaled > u32::MAX as u64 {
        u32::MAX
    } else {
        scaled as u32
    }
}

/// Mean of the per-sample millivolt values in `samples`.
///
/// Each sample is truncated to whole millivolts before summing and the mean
/// truncates again. An empty slice averages to zero.
#[must_use]
pub fn mean_mv(samples: &[u32]) -> u16 {
    if samples.is_empty() {
        return 0;
    }

    let total: u64 = samples.iter().map(|raw| u64::from(raw_to_mv(*raw))).sum();
    let mean = total / samples.len() as u64;
    u16::try_from(mean).unwrap_or(u16::MAX)
}

/// Average voltage, in millivolts, of everything currently in `buffer`.
#[must_use]
pub fn average_mv(buffer: &SamplingBuffer) -> u16 {
    mean_mv(buffer.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NUM_OF_SAMPLES;

    fn filled(raw: u32) -> SamplingBuffer {
        let mut buffer = SamplingBuffer::new();
        buffer.as_mut_slice().fill(raw);
        buffer
    }

    #[test]
    fn conversion_truncates() {
        assert_eq!(raw_to_mv(0), 0);
        assert_eq!(raw_to_mv(MAX_RAW_CODE), FULL_SCALE_MV);
        assert_eq!(raw_to_mv(2048), 1650);
        assert_eq!(raw_to_mv(1), 0);
    }

    #[test]
    fn identical_samples_average_to_their_conversion() {
        for raw in [0, 1, 1000, 2048, 3000, MAX_RAW_CODE] {
            let expected = u16::try_from(raw * FULL_SCALE_MV / MAX_RAW_CODE).unwrap();
            assert_eq!(average_mv(&filled(raw)), expected, "raw={raw}");
        }
    }

    #[test]
    fn truncation_happens_per_sample_before_the_mean() {
        let mut buffer = SamplingBuffer::new();
        for (index, slot) in buffer.as_mut_slice().iter_mut().enumerate() {
            *slot = if index % 2 == 0 { 0 } else { MAX_RAW_CODE };
        }
        let expected = (NUM_OF_SAMPLES as u32 / 2) * FULL_SCALE_MV / NUM_OF_SAMPLES as u32;
        assert_eq!(u32::from(average_mv(&buffer)), expected);

        // Code 2 is 1.6 mV; each sample drops its fraction before the sum.
        assert_eq!(mean_mv(&[2, 2, 2, 2]), 1);
    }

    #[test]
    fn empty_input_averages_to_zero() {
        assert_eq!(mean_mv(&[]), 0);
    }

    #[test]
    fn oversized_words_saturate() {
        assert_eq!(mean_mv(&[u32::MAX]), u16::MAX);
    }
}
