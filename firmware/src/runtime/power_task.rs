use crate::hw::power;
use crate::monitor::EventSender;

#[embassy_executor::task]
pub async fn run(events: EventSender<'static>) -> ! {
    power::run(events).await
}
