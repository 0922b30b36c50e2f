//! Per-printer controller: task queue, active-task slot, status cache and the
//! human-intervention gate.

use std::collections::VecDeque;
use std::time::Instant;

use farm_client::{DeviceClient, PrinterState};
use farm_core::{DeviceTask, FilamentChange, PrintJob, PrinterId, TaskId};

/// Cached aggregate of the last successful status poll.
#[derive(Debug, Clone, Default)]
pub struct StatusCache {
    pub flags: farm_client::PrinterFlags,
    pub temperature: farm_client::Temperatures,
    pub job_file_name: Option<String>,
    pub job_estimated_total_s: Option<u64>,
    pub job_estimated_left_s: Option<u64>,
    pub connection_error: bool,
    pub last_update: Option<chrono::DateTime<chrono::Utc>>,
}

impl StatusCache {
    pub fn instance_ready(&self) -> bool {
        self.flags.ready && !self.connection_error
    }
}

/// Runtime state owned by one `DeviceController`. `ControllerId` keys this
/// in `FarmState::controllers`; the linked `Printer` record lives separately.
pub struct ControllerRuntime {
    pub printer: PrinterId,
    pub client: DeviceClient,
    pub queue: VecDeque<TaskId>,
    pub active: Option<TaskId>,
    pub status: StatusCache,
    pub locked: bool,
    pub notification_count: u32,
    /// Wall-clock instant of the last successful status poll, used by the
    /// watchdog to detect a stalled poller.
    pub last_poll_at: Option<Instant>,
}

impl std::fmt::Debug for ControllerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerRuntime")
            .field("printer", &self.printer)
            .field("queue_len", &self.queue.len())
            .field("active", &self.active)
            .field("locked", &self.locked)
            .finish()
    }
}

impl ControllerRuntime {
    pub fn new(printer: PrinterId, client: DeviceClient) -> Self {
        Self {
            printer,
            client,
            queue: VecDeque::new(),
            active: None,
            status: StatusCache::default(),
            locked: false,
            notification_count: 0,
            last_poll_at: None,
        }
    }

    /// Append to the queue; no state transitions beyond this.
    pub fn enqueue(&mut self, task: TaskId) {
        self.queue.push_back(task);
    }

    pub fn connection_ready(&self) -> bool {
        !self.locked && self.status.instance_ready()
    }

    pub fn active_task_free_or_done(&self, tasks: &[DeviceTask]) -> bool {
        match self.active {
            None => true,
            Some(id) => tasks.iter().find(|t| t.id == id).is_some_and(|t| t.ready()),
        }
    }

    pub fn awaiting_human(&self, tasks: &[DeviceTask], jobs: &[PrintJob], changes: &[FilamentChange]) -> bool {
        match self.active {
            None => false,
            Some(id) => tasks
                .iter()
                .find(|t| t.id == id)
                .is_some_and(|t| t.awaiting_human(jobs, changes)),
        }
    }

    pub fn printer_ready(&self, tasks: &[DeviceTask], jobs: &[PrintJob], changes: &[FilamentChange]) -> bool {
        self.connection_ready()
            && self.active_task_free_or_done(tasks)
            && !self.awaiting_human(tasks, jobs, changes)
    }

    /// Clear the active slot (terminal or cancelled) and promote the next
    /// runnable queued task, if any.
    ///
    /// Tie-break: scans the queue in insertion order and keeps the *last*
    /// dependency-ready task it sees, so an explicit dependency wired by the
    /// dispatcher onto the tail of the queue wins over earlier unrelated work.
    pub fn promote_next(
        &mut self,
        tasks: &[DeviceTask],
        jobs: &[PrintJob],
        changes: &[FilamentChange],
    ) -> Option<TaskId> {
        if self.active.is_some() {
            return None;
        }
        if !self.printer_ready(tasks, jobs, changes) {
            return None;
        }
        let mut selected = None;
        for &candidate in &self.queue {
            let Some(task) = tasks.iter().find(|t| t.id == candidate) else {
                continue;
            };
            if task.dependencies_ready(tasks, jobs, changes) {
                selected = Some(candidate);
            }
        }
        if let Some(id) = selected {
            self.queue.retain(|&t| t != id);
            self.active = Some(id);
        }
        selected
    }

    /// Mark the active task cancelled; optionally notify the remote device.
    /// Idempotent: calling this with no active task is a no-op.
    pub async fn cancel_active(&mut self, notify_remote: bool) -> Option<TaskId> {
        let id = self.active.take()?;
        if notify_remote {
            if let Err(err) = self.client.cancel().await {
                tracing::warn!(printer = %self.printer, error = %err, "remote cancel failed");
            }
        }
        Some(id)
    }

    /// Force-clear the active slot and status cache.
    pub fn reset(&mut self) {
        self.active = None;
        self.status = StatusCache::default();
        self.notification_count = 0;
    }

    pub fn snapshot_status(&self) -> StatusCache {
        self.status.clone()
    }

    pub fn apply_poll(&mut self, printer_state: PrinterState, job_state: farm_client::JobState, now: chrono::DateTime<chrono::Utc>) {
        self.status.flags = printer_state.flags;
        self.status.temperature = printer_state.temperature;
        self.status.job_file_name = job_state.file_name;
        self.status.job_estimated_total_s = job_state.estimated_total_s;
        self.status.job_estimated_left_s = job_state.estimated_left_s;
        self.status.connection_error = false;
        self.status.last_update = Some(now);
        self.last_poll_at = Some(Instant::now());
    }

    pub fn mark_connection_error(&mut self) {
        self.status.connection_error = true;
    }
}
