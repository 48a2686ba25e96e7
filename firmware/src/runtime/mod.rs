use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_sync::channel::Channel;
use monitor_core::buffer::SamplingBuffer;
use monitor_core::config::MonitorConfig;
use monitor_core::hal::Peripherals;
use monitor_core::monitor::VoltageMonitor;
use static_cell::StaticCell;

use crate::hw::dma::DmaBuffer;
use crate::hw::{
    Adc1Converter, DmaTransfer, G0Board, PowerWindowTimer, RccClocks, SensorPowerPin, Tim3Trigger,
    TriggerRouter,
};
use crate::monitor::{CommandQueue, EventQueue, MonitorCommand, MonitorDriver, ReportQueue};

mod monitor_task;
mod power_task;
mod report_task;
mod transfer_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static COMMAND_QUEUE: CommandQueue = Channel::new();
pub(super) static EVENT_QUEUE: EventQueue = Channel::new();
pub(super) static REPORT_QUEUE: ReportQueue = Channel::new();
static SAMPLES: StaticCell<SamplingBuffer> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA0,
        PA1,
        ADC1,
        TIM3,
        DMA1_CH1,
        ..
    } = hal::init(config);

    let buffer = DmaBuffer::new(SAMPLES.init(SamplingBuffer::new()));

    let peripherals = Peripherals::<G0Board>::new(
        RccClocks,
        Tim3Trigger::new(TIM3),
        TriggerRouter::default(),
        Adc1Converter::new(ADC1, PA0),
        DmaTransfer::new(buffer),
        SensorPowerPin::new(Output::new(PA1, Level::Low, Speed::Low)),
        PowerWindowTimer,
    );

    let mut driver = MonitorDriver::new(VoltageMonitor::new(peripherals, MonitorConfig::default()));
    driver.initialize().expect("sampling pipeline configuration");

    spawner
        .spawn(transfer_task::run(DMA1_CH1, buffer, EVENT_QUEUE.sender()))
        .expect("failed to spawn transfer task");
    spawner
        .spawn(power_task::run(EVENT_QUEUE.sender()))
        .expect("failed to spawn power timer task");
    spawner
        .spawn(monitor_task::run(
            driver,
            COMMAND_QUEUE.receiver(),
            EVENT_QUEUE.receiver(),
            REPORT_QUEUE.sender(),
        ))
        .expect("failed to spawn monitor task");
    spawner
        .spawn(report_task::run(
            REPORT_QUEUE.receiver(),
            COMMAND_QUEUE.sender(),
        ))
        .expect("failed to spawn report task");

    COMMAND_QUEUE.send(MonitorCommand::StartNext).await;

    core::future::pending::<()>().await;
}
