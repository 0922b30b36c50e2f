//! In-process fleet state: every collection the control loop reads or writes.
//!
//! A single `FarmState` behind one `Arc<tokio::sync::RwLock<_>>` plays the role
//! `ProcessStore` plays for the workflow engine this crate is modeled on: one
//! place all ticks read from and write to, so a persistent backing store could
//! be swapped in later without touching call sites. Only the in-memory shape
//! is provided here; persistence is out of scope for the control loop itself.

use std::collections::HashMap;

use farm_core::{
    ControllerId, DeviceTask, Filament, FilamentChange, FilamentChangeId, Order, OrderId, Piece,
    PieceId, PrintJob, PrintJobId, Printer, PrinterId, Schedule, SliceJob, SliceJobId, TaskId,
    UnitPiece,
};

use crate::controller::ControllerRuntime;

/// All fleet state, owned by the coordinator and shared behind an `RwLock`.
#[derive(Debug, Default)]
pub struct FarmState {
    pub orders: HashMap<OrderId, Order>,
    pub pieces: HashMap<PieceId, Piece>,
    pub unit_pieces: Vec<UnitPiece>,
    pub filaments: HashMap<farm_core::FilamentId, Filament>,
    pub printers: HashMap<PrinterId, Printer>,
    pub controllers: HashMap<ControllerId, ControllerRuntime>,
    pub tasks: HashMap<TaskId, DeviceTask>,
    pub print_jobs: HashMap<PrintJobId, PrintJob>,
    pub filament_changes: HashMap<FilamentChangeId, FilamentChange>,
    pub slice_jobs: HashMap<SliceJobId, SliceJob>,
    /// Most recent schedule last.
    pub schedules: Vec<Schedule>,
}

impl FarmState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_schedule(&self) -> Option<&Schedule> {
        self.schedules.last()
    }

    pub fn print_jobs_slice(&self) -> Vec<PrintJob> {
        self.print_jobs.values().cloned().collect()
    }

    pub fn filament_changes_slice(&self) -> Vec<FilamentChange> {
        self.filament_changes.values().cloned().collect()
    }

    pub fn tasks_slice(&self) -> Vec<DeviceTask> {
        self.tasks.values().cloned().collect()
    }

    /// Pieces eligible to be scheduled: quote ready, not cancelled, queued>0.
    pub fn placeable_pieces(&self) -> Vec<&Piece> {
        let unit_pieces = &self.unit_pieces;
        let jobs = self.print_jobs_slice();
        self.pieces
            .values()
            .filter(|p| p.placeable(unit_pieces, &jobs))
            .collect()
    }

    pub fn enabled_printers(&self) -> Vec<&Printer> {
        self.printers
            .values()
            .filter(|p| {
                !p.disabled
                    && self
                        .controllers
                        .get(&p.controller)
                        .is_some_and(|c| !c.status.connection_error)
            })
            .collect()
    }

    pub fn task_ready(&self, id: TaskId) -> bool {
        self.tasks.get(&id).is_some_and(|t| t.ready())
    }

    pub fn task_finished(&self, id: TaskId) -> bool {
        let jobs = self.print_jobs_slice();
        let changes = self.filament_changes_slice();
        self.tasks
            .get(&id)
            .is_some_and(|t| t.finished(&jobs, &changes))
    }
}
