//! DMA1 channel 1 copying ADC1 results into the sampling buffer.
//!
//! The monitor arms and disarms through [`DmaTransfer`]. The transfer itself
//! is an embassy [`Transfer`] future owned by [`run`], so its completion
//! interrupt wakes that task, which forwards
//! [`MonitorEvent::TransferComplete`] to the monitor task.

#![cfg(target_os = "none")]

use core::ptr::NonNull;

use embassy_futures::select::{Either, select};
use embassy_stm32::Peri;
use embassy_stm32::dma::{Request, Transfer, TransferOptions};
use embassy_stm32::pac;
use embassy_stm32::peripherals::DMA1_CH1;
use embassy_sync::signal::Signal;
use monitor_core::buffer::SamplingBuffer;
use monitor_core::hal::{HardwareFault, TransferConfig, TransferEngine, TransferSource};
use monitor_core::monitor::MonitorEvent;

use crate::monitor::{EventSender, MonitorMutex};
use crate::progress::TransferProgress;

/// DMAMUX request line for ADC1 on STM32G0.
const ADC1_DMA_REQUEST: Request = 5;

/// Arm/disarm requests for the transfer task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransferControl {
    Arm,
    Disarm,
}

pub type TransferSignal = Signal<MonitorMutex, TransferControl>;

pub static TRANSFER_CONTROL: TransferSignal = Signal::new();
static PROGRESS: TransferProgress = TransferProgress::new();

/// Sampling buffer shared by the monitor (reads) and the DMA channel (writes).
#[derive(Copy, Clone)]
pub struct DmaBuffer(NonNull<SamplingBuffer>);

// The buffer lives in a `StaticCell` and is only written by DMA between arm
// and completion, while the monitor does not read it.
unsafe impl Send for DmaBuffer {}

impl DmaBuffer {
    pub fn new(buffer: &'static mut SamplingBuffer) -> Self {
        Self(NonNull::from(buffer))
    }

    fn words(self) -> *mut [u32] {
        unsafe { (*self.0.as_ptr()).as_mut_ptr() }
    }
}

pub struct DmaTransfer {
    buffer: DmaBuffer,
    count: usize,
}

impl DmaTransfer {
    pub fn new(buffer: DmaBuffer) -> Self {
        Self { buffer, count: 0 }
    }
}

impl TransferEngine for DmaTransfer {
    fn configure(&mut self, config: TransferConfig) -> Result<(), HardwareFault> {
        let capacity = unsafe { self.buffer.0.as_ref() }.len();
        if config.source != TransferSource::ConverterResult
            || config.count != capacity
            || !config.interrupt_on_done
        {
            return Err(HardwareFault::Unsupported);
        }
        self.count = config.count;
        Ok(())
    }

    fn arm(&mut self) {
        if self.count == 0 {
            return;
        }
        PROGRESS.arm(self.count);
        TRANSFER_CONTROL.signal(TransferControl::Arm);
    }

    fn disarm(&mut self) {
        PROGRESS.disarm();
        TRANSFER_CONTROL.signal(TransferControl::Disarm);
    }

    fn is_armed(&self) -> bool {
        PROGRESS.is_armed()
    }

    /// Live while the channel runs, so a stop sees the words landed so far.
    fn transferred(&self) -> usize {
        PROGRESS.transferred(remaining_words)
    }

    fn landed(&self) -> &SamplingBuffer {
        unsafe { self.buffer.0.as_ref() }
    }
}

/// Down-counter of DMA1 channel 1.
fn remaining_words() -> usize {
    usize::from(pac::DMA1.ch(0).ndtr().read().ndt())
}

/// Runs one DMA transfer per arm request until cancelled or complete.
pub async fn run(
    mut channel: Peri<'static, DMA1_CH1>,
    buffer: DmaBuffer,
    events: EventSender<'static>,
) -> ! {
    let mut pending = None;
    loop {
        let control = match pending.take() {
            Some(control) => control,
            None => TRANSFER_CONTROL.wait().await,
        };
        if control != TransferControl::Arm {
            continue;
        }

        let source = pac::ADC1.dr().as_ptr().cast::<u32>();
        let mut transfer = unsafe {
            Transfer::new_read_raw(
                channel.reborrow(),
                ADC1_DMA_REQUEST,
                source,
                buffer.words(),
                TransferOptions::default(),
            )
        };

        PROGRESS.started();
        match select(&mut transfer, TRANSFER_CONTROL.wait()).await {
            Either::First(()) => {
                PROGRESS.completed();
                events.send(MonitorEvent::TransferComplete).await;
            }
            Either::Second(next) => {
                PROGRESS.cancelled(usize::from(transfer.get_remaining_transfers()));
                // Dropping the transfer stops the channel.
                drop(transfer);
                pending = Some(next);
            }
        }
    }
}
