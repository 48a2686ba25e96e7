use embassy_stm32::Peri;
use embassy_stm32::peripherals::DMA1_CH1;

use crate::hw::dma::{self, DmaBuffer};
use crate::monitor::EventSender;

#[embassy_executor::task]
pub async fn run(
    channel: Peri<'static, DMA1_CH1>,
    buffer: DmaBuffer,
    events: EventSender<'static>,
) -> ! {
    dma::run(channel, buffer, events).await
}
