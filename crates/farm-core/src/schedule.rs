//! Scheduler output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{PieceId, PrinterId, ScheduleEntryId, ScheduleId, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    Optimal,
    Infeasible,
    Invalid,
    Unknown,
}

/// Exactly one of `piece`/`device_task` is set: a pending piece not yet
/// materialized into a device task, or an in-flight device task being
/// re-accounted for in the current horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleSubject {
    Piece(PieceId),
    DeviceTask(TaskId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: ScheduleEntryId,
    pub schedule: ScheduleId,
    pub printer: PrinterId,
    pub subject: ScheduleSubject,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
}

impl ScheduleEntry {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.start <= now
    }

    pub fn piece(&self) -> Option<PieceId> {
        match self.subject {
            ScheduleSubject::Piece(p) => Some(p),
            ScheduleSubject::DeviceTask(_) => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub created: DateTime<Utc>,
    pub finished: Option<DateTime<Utc>>,
    pub status: SolverStatus,
    pub entries: Vec<ScheduleEntry>,
    pub launched_tasks: Vec<TaskId>,
}

impl Schedule {
    pub fn ready(&self) -> bool {
        self.finished.is_some()
    }
}
