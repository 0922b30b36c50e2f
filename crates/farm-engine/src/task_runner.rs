//! Drives a controller's active `DeviceTask` to completion.
//!
//! One function per concern: dispatch (send to the remote host once),
//! and poll (fold a status snapshot into terminal-state detection). The
//! periodic tick calls `dispatch_active` right after promotion and
//! `poll_active` on every status-poll cycle; neither blocks on device I/O
//! beyond a single request, so the owning `tokio::select!` loop stays live.

use chrono::{DateTime, Utc};
use farm_core::{
    FilamentChange, ProgramSource, TaskKind, TaskStatus, FILAMENT_CHANGE_MEAN_DURATION_S,
};

use crate::controller::ControllerRuntime;
use crate::state::FarmState;

/// Cancels a controller's active task: clears the queue slot, optionally
/// tells the remote device, marks the task `Cancelled` in shared state and
/// fails any `PrintJob` attached to it. A no-op if nothing is active.
pub async fn cancel_active_task(
    state: &mut FarmState,
    controller_id: farm_core::ControllerId,
    notify_remote: bool,
    now: DateTime<Utc>,
) -> Option<farm_core::TaskId> {
    let task_id = {
        let ctrl = state.controllers.get_mut(&controller_id)?;
        ctrl.cancel_active(notify_remote).await?
    };

    if let Some(task) = state.tasks.get_mut(&task_id) {
        task.status = TaskStatus::Cancelled;
    }
    if let Some(job) = state.print_jobs.values_mut().find(|j| j.task == task_id) {
        job.confirm_result(false, now);
    }

    Some(task_id)
}

/// Send the active task to the remote device exactly once (`DeviceTask::sent`
/// guards re-dispatch across ticks). `program_dir` is the storage root
/// program files are read from before upload.
pub async fn dispatch_active(
    state: &mut FarmState,
    controller_id: farm_core::ControllerId,
    program_dir: &std::path::Path,
    now: DateTime<Utc>,
) {
    let Some(task_id) = state.controllers.get(&controller_id).and_then(|c| c.active) else {
        return;
    };
    let already_sent = state.tasks.get(&task_id).is_some_and(|t| t.sent);
    if already_sent {
        return;
    }
    let Some(kind) = state.tasks.get(&task_id).map(|t| t.kind.clone()) else {
        return;
    };

    match kind {
        TaskKind::Command { commands } => {
            let lines: Vec<&str> = commands.lines().collect();
            let result = {
                let Some(ctrl) = state.controllers.get(&controller_id) else {
                    return;
                };
                ctrl.client.issue_commands(&lines).await
            };
            let task = state.tasks.get_mut(&task_id).expect("task exists");
            task.sent = true;
            match result {
                // Commands are fire-and-forget: acceptance is completion.
                Ok(()) => task.status = TaskStatus::Active,
                Err(err) => task.status = TaskStatus::Failed(err.to_string()),
            }
        }
        TaskKind::Program { source } => {
            let file_name = match source {
                ProgramSource::Ready { file_name } => Some(file_name),
                ProgramSource::Slice { slice_job } => state
                    .slice_jobs
                    .get(&slice_job)
                    .filter(|j| j.ready())
                    .and_then(|j| j.program_file.clone()),
            };
            let Some(file_name) = file_name else {
                // Slice job not ready yet; stay queued-but-active until the next tick.
                return;
            };
            let local_path = program_dir.join(&file_name);
            let remote_name = local_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(&file_name)
                .to_string();
            let content = match tokio::fs::read(&local_path).await {
                Ok(bytes) => bytes,
                Err(err) => {
                    let task = state.tasks.get_mut(&task_id).expect("task exists");
                    task.sent = true;
                    task.status = TaskStatus::Failed(format!(
                        "reading program file {}: {err}",
                        local_path.display()
                    ));
                    return;
                }
            };
            let result = {
                let Some(ctrl) = state.controllers.get(&controller_id) else {
                    return;
                };
                ctrl.client.upload_and_start(&remote_name, content).await
            };
            let task = state.tasks.get_mut(&task_id).expect("task exists");
            task.sent = true;
            match result {
                Ok(remote_name) => {
                    task.remote_filename = Some(remote_name);
                    task.status = TaskStatus::Active;
                }
                Err(err) => task.status = TaskStatus::Failed(err.to_string()),
            }
        }
        TaskKind::FilamentChange { change } => {
            let Some(change_record) = state.filament_changes.get(&change).cloned() else {
                return;
            };
            let bed = change_record.new_filament.bed_temperature();
            let nozzle = change_record.new_filament.nozzle_temperature();
            let commands = [
                format!("M140 S{bed}"),
                format!("M104 S{nozzle}"),
                "M400".to_string(),
            ];
            let lines: Vec<&str> = commands.iter().map(String::as_str).collect();
            let result = {
                let Some(ctrl) = state.controllers.get(&controller_id) else {
                    return;
                };
                ctrl.client.issue_commands(&lines).await
            };
            let task = state.tasks.get_mut(&task_id).expect("task exists");
            task.sent = true;
            match result {
                // Stays non-terminal until a human confirms the swap, whatever
                // the preheat command's own acceptance status.
                Ok(()) => task.status = TaskStatus::Active,
                Err(err) => task.status = TaskStatus::Failed(err.to_string()),
            }
        }
    }
}

/// Fold a fresh status snapshot into the active task's terminal state.
/// Called once per poll cycle for every controller with a sent, non-terminal
/// active task.
pub fn poll_active(state: &mut FarmState, controller_id: farm_core::ControllerId, now: DateTime<Utc>) {
    let Some(task_id) = state.controllers.get(&controller_id).and_then(|c| c.active) else {
        return;
    };
    let Some(task) = state.tasks.get(&task_id) else {
        return;
    };
    if !task.sent || task.status.is_terminal() {
        return;
    }

    match &task.kind {
        TaskKind::Command { .. } => {
            // Acceptance already promoted this to Active/terminal at dispatch time.
        }
        TaskKind::Program { .. } => {
            let remote_filename = task.remote_filename.clone();
            let Some(ctrl) = state.controllers.get(&controller_id) else {
                return;
            };
            let printing = ctrl.status.flags.printing || ctrl.status.flags.paused;
            let job_matches = remote_filename
                .as_deref()
                .is_some_and(|expected| ctrl.status.job_file_name.as_deref() == Some(expected));

            if printing && job_matches {
                return;
            }
            if !printing && job_matches {
                // Finishing flag clears once the host reports idle on the same file.
                finish_program(state, task_id, now);
                return;
            }
            if remote_filename.is_some() && !job_matches && !printing {
                // Tracking lost: the host moved on to something else without a
                // job-state transition we observed.
                let task = state.tasks.get_mut(&task_id).expect("task exists");
                task.status = TaskStatus::Failed("job tracking lost".to_string());
            }
        }
        TaskKind::FilamentChange { change } => {
            let confirmed = state.filament_changes.get(change).is_some_and(|c| c.confirmed);
            if confirmed {
                let task = state.tasks.get_mut(&task_id).expect("task exists");
                task.status = TaskStatus::Done;
            }
        }
    }
}

/// Marks the program task `Done`. Pass/fail confirmation of the attached
/// `PrintJob` (bed-removal) is a separate human step recorded later via
/// `PrintJob::confirm_result`; this only clears the device-side wait.
fn finish_program(state: &mut FarmState, task_id: farm_core::TaskId, now: DateTime<Utc>) {
    let _ = now;
    let task = state.tasks.get_mut(&task_id).expect("task exists");
    task.status = TaskStatus::Done;
}

/// Estimated seconds remaining on the controller's active task, or `None`
/// when no estimate is available yet.
pub fn time_left(
    state: &FarmState,
    ctrl: &ControllerRuntime,
    changes: &[FilamentChange],
    now: DateTime<Utc>,
) -> Option<u64> {
    let task_id = ctrl.active?;
    let task = state.tasks.get(&task_id)?;
    match &task.kind {
        TaskKind::Command { .. } => Some(1),
        TaskKind::Program { source } => {
            if let Some(secs) = ctrl.status.job_estimated_left_s {
                return Some(secs);
            }
            // Remote reports no time-left; fall back to the estimated end
            // of the job, floored at 600s so a stale or missing poll never
            // reports the task as done-any-moment.
            let (last_update, total_s) = (ctrl.status.last_update?, ctrl.status.job_estimated_total_s);
            if let Some(total_s) = total_s {
                let end = last_update + chrono::Duration::seconds(total_s as i64);
                let remaining = (end - now).num_seconds();
                return Some(remaining.max(600) as u64);
            }
            match source {
                ProgramSource::Ready { .. } => None,
                ProgramSource::Slice { slice_job } => {
                    state.slice_jobs.get(slice_job).map(|j| j.estimated_build_time())
                }
            }
        }
        TaskKind::FilamentChange { change } => {
            let record = changes.iter().find(|c| c.id == *change)?;
            if record.confirmed {
                return Some(0);
            }
            let elapsed = (now - record.created).num_seconds().max(0) as u64;
            Some(FILAMENT_CHANGE_MEAN_DURATION_S.saturating_sub(elapsed))
        }
    }
}
