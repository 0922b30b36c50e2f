//! Device task kinds, readiness and dependency logic.
//!
//! Kind-discriminated behavior is expressed as a tagged sum rather than a
//! class hierarchy, per the "polymorphism across task kinds" design note.

use serde::{Deserialize, Serialize};

use crate::ids::{ControllerId, FilamentChangeId, SliceJobId, TaskId};
use crate::job::{FilamentChange, PrintJob};

/// Where a `program` task's file comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramSource {
    /// The piece already carried a ready-to-print program.
    Ready { file_name: String },
    /// The program is the output of an external slicing job; runnable once `ready()`.
    Slice { slice_job: SliceJobId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// A one-shot raw command script; no device-side completion tracking.
    Command { commands: String },
    /// A program task, ready-to-print or gated on an external slice job (slice-then-program).
    Program { source: ProgramSource },
    /// A compound task wrapping a synthesized preheat/home command program, gated on
    /// a human confirming the physical filament swap.
    FilamentChange { change: FilamentChangeId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Queued,
    Active,
    Done,
    Failed(String),
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed(_) | TaskStatus::Cancelled)
    }
}

/// Unit of work dispatched to a single `DeviceController`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTask {
    pub id: TaskId,
    pub controller: ControllerId,
    pub kind: TaskKind,
    pub dependency: Option<TaskId>,
    pub status: TaskStatus,
    pub sent: bool,
    pub remote_filename: Option<String>,
}

impl DeviceTask {
    pub fn new(controller: ControllerId, kind: TaskKind, dependency: Option<TaskId>) -> Self {
        Self {
            id: TaskId::new(),
            controller,
            kind,
            dependency,
            status: TaskStatus::Queued,
            sent: false,
            remote_filename: None,
        }
    }

    /// The external-async-result sense of "ready": the runner has produced a terminal
    /// outcome, independent of whether a human still needs to intervene.
    pub fn ready(&self) -> bool {
        self.status.is_terminal()
    }

    /// True while a human must act before this task can be considered complete.
    pub fn awaiting_human(&self, jobs: &[PrintJob], changes: &[FilamentChange]) -> bool {
        match &self.kind {
            TaskKind::FilamentChange { change } => changes
                .iter()
                .find(|c| c.id == *change)
                .is_some_and(|c| !c.confirmed),
            TaskKind::Program { .. } => {
                self.ready()
                    && jobs
                        .iter()
                        .any(|j| j.task == self.id && j.success.is_none())
            }
            TaskKind::Command { .. } => false,
        }
    }

    /// `ready ∧ ¬awaiting_human`.
    pub fn finished(&self, jobs: &[PrintJob], changes: &[FilamentChange]) -> bool {
        self.ready() && !self.awaiting_human(jobs, changes)
    }

    /// Transitive AND of `dependency.finished` up the chain.
    pub fn dependencies_ready(
        &self,
        all_tasks: &[DeviceTask],
        jobs: &[PrintJob],
        changes: &[FilamentChange],
    ) -> bool {
        let Some(dep_id) = self.dependency else {
            return true;
        };
        let Some(dep) = all_tasks.iter().find(|t| t.id == dep_id) else {
            // Dependency vanished from the working set; treat as not ready rather
            // than panicking on a dangling reference.
            return false;
        };
        if matches!(dep.status, TaskStatus::Cancelled) {
            // A cancelled dependency blocks promotion permanently.
            return false;
        }
        dep.finished(jobs, changes) && dep.dependencies_ready(all_tasks, jobs, changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::ControllerId;

    fn command_task() -> DeviceTask {
        DeviceTask::new(
            ControllerId::new(),
            TaskKind::Command {
                commands: "G28".to_string(),
            },
            None,
        )
    }

    #[test]
    fn command_task_finishes_once_sent() {
        let mut t = command_task();
        assert!(!t.finished(&[], &[]));
        t.status = TaskStatus::Done;
        assert!(t.finished(&[], &[]));
    }

    #[test]
    fn dependency_chain_requires_full_finish() {
        let mut dep = command_task();
        dep.status = TaskStatus::Queued;
        let mut t = command_task();
        t.dependency = Some(dep.id);

        let all = vec![dep.clone(), t.clone()];
        assert!(!t.dependencies_ready(&all, &[], &[]));

        let mut dep_done = dep;
        dep_done.status = TaskStatus::Done;
        let all = vec![dep_done, t.clone()];
        assert!(t.dependencies_ready(&all, &[], &[]));
    }

    #[test]
    fn cancelled_dependency_blocks_forever() {
        let mut dep = command_task();
        dep.status = TaskStatus::Cancelled;
        let mut t = command_task();
        t.dependency = Some(dep.id);

        let all = vec![dep, t.clone()];
        assert!(!t.dependencies_ready(&all, &[], &[]));
    }
}
