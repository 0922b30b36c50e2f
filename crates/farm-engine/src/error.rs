use thiserror::Error;

use farm_core::{PieceId, PrinterId, TaskId};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller for printer {0} not found")]
    NotFound(PrinterId),

    #[error("task {0} not found on this controller's queue")]
    TaskNotFound(TaskId),

    #[error("device host error: {0}")]
    Device(#[from] farm_client::DeviceClientError),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no printers available to schedule against")]
    NoPrinters,
}

#[derive(Debug, Error)]
pub enum DispatcherError {
    #[error("due entry count does not match distinct due-printer count")]
    DuePrinterMismatch,

    #[error("piece {0} has no compatible filament available")]
    FilamentUnavailable(PieceId),
}
