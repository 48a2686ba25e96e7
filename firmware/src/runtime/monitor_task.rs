use embassy_futures::select::{Either, select};

use crate::hw::G0Board;
use crate::monitor::{
    CommandReceiver, EventReceiver, MonitorDriver, MonitorInput, ReportSender,
};

#[embassy_executor::task]
pub async fn run(
    mut driver: MonitorDriver<G0Board>,
    commands: CommandReceiver<'static>,
    events: EventReceiver<'static>,
    reports: ReportSender<'static>,
) -> ! {
    loop {
        let input = match select(events.receive(), commands.receive()).await {
            Either::First(event) => MonitorInput::Event(event),
            Either::Second(command) => MonitorInput::Command(command),
        };

        if let Some(complete) = driver.dispatch(input) {
            reports.send(complete).await;
        }
    }
}
