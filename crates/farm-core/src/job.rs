//! `PrintJob` and `FilamentChange` bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::filament::Filament;
use crate::ids::{FilamentChangeId, PrintJobId, TaskId};

/// Duration a filament change is assumed to take, used as its `time_left` estimate
/// until real swap-duration telemetry exists (`FilamentChange.filament_change_mean_duration`).
pub const FILAMENT_CHANGE_MEAN_DURATION_S: u64 = 15 * 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilamentChange {
    pub id: FilamentChangeId,
    pub new_filament: Filament,
    pub task: TaskId,
    pub confirmed: bool,
    pub created: DateTime<Utc>,
    pub confirmed_date: Option<DateTime<Utc>>,
}

impl FilamentChange {
    pub fn new(new_filament: Filament, task: TaskId, now: DateTime<Utc>) -> Self {
        Self {
            id: FilamentChangeId::new(),
            new_filament,
            task,
            confirmed: false,
            created: now,
            confirmed_date: None,
        }
    }

    /// Confirm the swap. The caller (controller/API handler) is responsible for the
    /// explicit event hook that writes the new filament onto the printer record;
    /// this type never mutates a `Printer` itself.
    pub fn confirm(&mut self, now: DateTime<Utc>) {
        self.confirmed = true;
        self.confirmed_date = Some(now);
    }
}

/// Bookkeeping for one attempted print, attached to one `program`/`slice-then-program` task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: PrintJobId,
    pub task: TaskId,
    pub filament: Filament,
    pub created: DateTime<Utc>,
    pub estimated_end_time: Option<DateTime<Utc>>,
    pub success: Option<bool>,
    pub end_time: Option<DateTime<Utc>>,
}

impl PrintJob {
    pub fn new(task: TaskId, filament: Filament, now: DateTime<Utc>) -> Self {
        Self {
            id: PrintJobId::new(),
            task,
            filament,
            created: now,
            estimated_end_time: None,
            success: None,
            end_time: None,
        }
    }

    /// `¬task.ready`. Caller supplies whether the owning task has reached a
    /// terminal state, since `PrintJob` does not hold a back-reference to the
    /// task table.
    pub fn printing(&self, task_ready: bool) -> bool {
        !task_ready
    }

    /// `¬printing ∧ success = null`.
    pub fn awaiting_bed_removal(&self, task_ready: bool) -> bool {
        !self.printing(task_ready) && self.success.is_none()
    }

    pub fn pending_with(&self, task_ready: bool) -> bool {
        self.printing(task_ready) || self.awaiting_bed_removal(task_ready)
    }

    /// Convenience used wherever only the job itself (not its task) is in hand:
    /// a job still `pending` in the narrow "not yet confirmed" sense.
    pub fn pending(&self) -> bool {
        self.success.is_none() || self.end_time.is_none()
    }

    pub fn confirm_result(&mut self, success: bool, now: DateTime<Utc>) {
        self.success = Some(success);
        self.end_time = Some(now);
    }
}
