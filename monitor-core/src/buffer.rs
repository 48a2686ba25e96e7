//! Fixed-length destination for converter results.

use core::ops::Index;

use crate::config::NUM_OF_SAMPLES;

/// Raw converter words written by the transfer engine, one per trigger pulse.
///
/// The buffer is allocated once and reused in place: every session overwrites
/// it from index 0, and only the transfer engine writes while a session is
/// active. Word-sized entries mirror the transfer width, so the upper bits of
/// each entry are whatever the converter's result register reports.
#[derive(Clone, Debug, Eq, PartialEq)]
#[repr(C, align(4))]
pub struct SamplingBuffer {
    samples: [u32; NUM_OF_SAMPLES],
}

impl SamplingBuffer {
    /// Creates a zeroed buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            samples: [0; NUM_OF_SAMPLES],
        }
    }

    /// Number of entries; always [`NUM_OF_SAMPLES`].
    #[must_use]
    pub const fn len(&self) -> usize {
        NUM_OF_SAMPLES
    }

    /// Always `false`; the buffer is never resized.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        NUM_OF_SAMPLES == 0
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.samples
    }

    pub fn as_mut_slice(&mut self) -> &mut [u32] {
        &mut self.samples
    }

    /// Raw destination pointer handed to a hardware transfer engine.
    pub fn as_mut_ptr(&mut self) -> *mut [u32] {
        core::ptr::from_mut(self.samples.as_mut_slice())
    }

    /// Stores `raw` at `index`, returning `false` when the index is out of range.
    pub fn store(&mut self, index: usize, raw: u32) -> bool {
        match self.samples.get_mut(index) {
            Some(slot) => {
                *slot = raw;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> core::slice::Iter<'_, u32> {
        self.samples.iter()
    }
}

impl Default for SamplingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<usize> for SamplingBuffer {
    type Output = u32;

    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl<'a> IntoIterator for &'a SamplingBuffer {
    type Item = &'a u32;
    type IntoIter = core::slice::Iter<'a, u32>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_buffer_is_zeroed_and_full_length() {
        let buffer = SamplingBuffer::new();
        assert_eq!(buffer.len(), NUM_OF_SAMPLES);
        assert!(!buffer.is_empty());
        assert!(buffer.iter().all(|raw| *raw == 0));
    }

    #[test]
    fn store_rejects_out_of_range_index() {
        let mut buffer = SamplingBuffer::new();
        assert!(buffer.store(0, 7));
        assert!(buffer.store(NUM_OF_SAMPLES - 1, 9));
        assert!(!buffer.store(NUM_OF_SAMPLES, 11));

        assert_eq!(buffer[0], 7);
        assert_eq!(buffer[NUM_OF_SAMPLES - 1], 9);
    }
}
