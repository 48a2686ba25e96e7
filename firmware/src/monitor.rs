//! Monitor task plumbing shared by the target runtime and host tests.
//!
//! The monitor is owned by a single task. Commands from the application and
//! completion/timer events from the hardware tasks arrive on separate queues
//! and are serialised through [`MonitorDriver::dispatch`].

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use monitor_core::hal::{Board, PowerOutput};
use monitor_core::monitor::{
    InitError, MonitorEvent, SessionComplete, StartOutcome, StopOutcome, VoltageMonitor,
};

use crate::status;
use crate::telemetry::{self, TelemetryMirror};

/// Depth of the application command queue.
pub const COMMAND_QUEUE_DEPTH: usize = 4;

/// Depth of the hardware event queue.
pub const EVENT_QUEUE_DEPTH: usize = 4;

/// Completed sessions waiting for the report task.
pub const REPORT_QUEUE_DEPTH: usize = 2;

#[cfg(target_os = "none")]
pub type MonitorMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
pub type MonitorMutex = NoopRawMutex;

/// Requests the application can make of the monitor task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MonitorCommand {
    StartNext,
    Stop,
}

/// Anything the monitor task reacts to.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MonitorInput {
    Command(MonitorCommand),
    Event(MonitorEvent),
}

pub type CommandQueue = Channel<MonitorMutex, MonitorCommand, COMMAND_QUEUE_DEPTH>;
pub type CommandSender<'a> = Sender<'a, MonitorMutex, MonitorCommand, COMMAND_QUEUE_DEPTH>;
pub type CommandReceiver<'a> = Receiver<'a, MonitorMutex, MonitorCommand, COMMAND_QUEUE_DEPTH>;

pub type EventQueue = Channel<MonitorMutex, MonitorEvent, EVENT_QUEUE_DEPTH>;
pub type EventSender<'a> = Sender<'a, MonitorMutex, MonitorEvent, EVENT_QUEUE_DEPTH>;
pub type EventReceiver<'a> = Receiver<'a, MonitorMutex, MonitorEvent, EVENT_QUEUE_DEPTH>;

pub type ReportQueue = Channel<MonitorMutex, SessionComplete, REPORT_QUEUE_DEPTH>;
pub type ReportSender<'a> = Sender<'a, MonitorMutex, SessionComplete, REPORT_QUEUE_DEPTH>;
pub type ReportReceiver<'a> = Receiver<'a, MonitorMutex, SessionComplete, REPORT_QUEUE_DEPTH>;

/// Owns the monitor and keeps the status atomics and log mirror in step with it.
pub struct MonitorDriver<B: Board> {
    monitor: VoltageMonitor<B>,
    mirror: TelemetryMirror,
}

impl<B: Board> MonitorDriver<B> {
    pub fn new(monitor: VoltageMonitor<B>) -> Self {
        Self {
            monitor,
            mirror: TelemetryMirror::new(),
        }
    }

    /// Configures the pipeline, logging the failing block on error.
    pub fn initialize(&mut self) -> Result<(), InitError> {
        let result = self.monitor.initialize();
        if let Err(error) = &result {
            telemetry::log_init_failure(error);
        }
        self.sync();
        result
    }

    /// Applies one input and returns the completion it produced, if any.
    pub fn dispatch(&mut self, input: MonitorInput) -> Option<SessionComplete> {
        let complete = match input {
            MonitorInput::Command(MonitorCommand::StartNext) => {
                match self.monitor.start_next() {
                    StartOutcome::Uninitialized => {
                        if self.initialize().is_ok() {
                            let _ = self.monitor.start_next();
                        }
                    }
                    StartOutcome::Started(_)
                    | StartOutcome::StartedUnpowered { .. }
                    | StartOutcome::AlreadyActive => {}
                }
                None
            }
            MonitorInput::Command(MonitorCommand::Stop) => {
                match self.monitor.stop() {
                    StopOutcome::Stopped { .. } | StopOutcome::AlreadyIdle => {}
                }
                None
            }
            MonitorInput::Event(event) => self.monitor.handle_event(event),
        };

        if let Some(done) = &complete {
            status::record_completion(done.average_mv);
        }
        self.sync();
        complete
    }

    pub fn monitor(&self) -> &VoltageMonitor<B> {
        &self.monitor
    }

    fn sync(&mut self) {
        status::record_session_active(self.monitor.is_active());
        status::record_power(self.monitor.peripherals().power_pin.is_high());
        self.mirror.forward(self.monitor.telemetry());
    }
}
