//! Consumer of the completion signal: logs the average and starts the next
//! session.

use embassy_time::Timer;
use monitor_core::config::SAMPLE_PERIOD;

use crate::monitor::{CommandSender, MonitorCommand, ReportReceiver};
use crate::{status, telemetry};

#[embassy_executor::task]
pub async fn run(reports: ReportReceiver<'static>, commands: CommandSender<'static>) -> ! {
    let settle = embassy_time::Duration::from_micros(
        u64::try_from(SAMPLE_PERIOD.as_micros()).unwrap_or(u64::MAX),
    );

    loop {
        let complete = reports.receive().await;
        telemetry::log_report(&complete, &status::snapshot());

        Timer::after(settle).await;
        commands.send(MonitorCommand::StartNext).await;
    }
}
