#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Word counter for the DMA sampling transfer.
//!
//! The monitor task asks for progress while the transfer task still owns the
//! running channel, so the count is either read live from the channel or
//! taken from the value stored when the transfer finished.

use portable_atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct TransferProgress {
    armed: AtomicBool,
    running: AtomicBool,
    total: AtomicUsize,
    done: AtomicUsize,
}

impl TransferProgress {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            armed: AtomicBool::new(false),
            running: AtomicBool::new(false),
            total: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
        }
    }

    /// Resets the counter for a transfer of `total` words.
    pub fn arm(&self, total: usize) {
        self.running.store(false, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
        self.armed.store(true, Ordering::Release);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::Release);
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// The channel has been programmed and is counting down.
    pub fn started(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Every word landed.
    pub fn completed(&self) {
        self.done
            .store(self.total.load(Ordering::Relaxed), Ordering::Relaxed);
        self.running.store(false, Ordering::Release);
        self.armed.store(false, Ordering::Release);
    }

    /// The channel was stopped with `remaining` words outstanding.
    pub fn cancelled(&self, remaining: usize) {
        self.done.store(
            self.total.load(Ordering::Relaxed).saturating_sub(remaining),
            Ordering::Relaxed,
        );
        self.running.store(false, Ordering::Release);
    }

    /// Words landed so far. `remaining` reads the channel's down-counter and
    /// is only consulted while the channel is running.
    #[must_use]
    pub fn transferred(&self, remaining: impl FnOnce() -> usize) -> usize {
        if self.running.load(Ordering::Acquire) {
            self.total.load(Ordering::Relaxed).saturating_sub(remaining())
        } else {
            self.done.load(Ordering::Relaxed)
        }
    }
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}
