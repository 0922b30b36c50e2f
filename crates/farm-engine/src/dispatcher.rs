//! Materializes due schedule entries into device tasks.
//!
//! Grounded on `examples/original_source/skynet/scheduler.py::poma_dispatcher`:
//! before launching anything, try swapping due entries across printers to
//! avoid an unnecessary filament change, then for each due entry pick a
//! filament, create a slice-then-program or ready-program task (wiring a
//! filament-change task as its dependency when a swap isn't possible), and
//! record the resulting `PrintJob`/`UnitPiece`.

use chrono::{DateTime, Utc};
use farm_core::{
    Filament, FilamentChange, PieceSource, PrintJob, Printer, ProgramSource, Schedule,
    ScheduleEntry, ScheduleSubject, TaskId, TaskKind, UnitPiece,
};

use crate::error::DispatcherError;
use crate::state::FarmState;

/// Entries whose start has elapsed and whose subject is a piece awaiting
/// materialization (in-flight `DeviceTask` entries are re-accounting only).
fn due_entries(schedule: &Schedule, now: DateTime<Utc>) -> Vec<ScheduleEntry> {
    schedule
        .entries
        .iter()
        .filter(|e| e.is_due(now) && matches!(e.subject, ScheduleSubject::Piece(_)))
        .cloned()
        .collect()
}

/// Swaps printer assignments among due entries when doing so avoids a
/// filament change on the target printer, without breaking either piece's
/// size/print-settings compatibility with its new printer.
fn swap_to_avoid_filament_changes(entries: &mut [ScheduleEntry], state: &FarmState) {
    let printers = due_printers(entries);
    if entries.len() != printers.len() {
        return;
    }

    for i in 0..entries.len() {
        let Some(piece) = state.pieces.get(&piece_id(&entries[i])) else {
            continue;
        };
        for &printer_id in &printers {
            let Some(printer) = state.printers.get(&printer_id) else {
                continue;
            };
            if !filament_compatible(piece, printer) {
                continue;
            }
            let Some(j) = entries.iter().position(|e| e.printer == printer_id) else {
                break;
            };
            if i == j {
                break;
            }
            let Some(target_piece) = state.pieces.get(&piece_id(&entries[j])) else {
                break;
            };
            let Some(entry_printer) = state.printers.get(&entries[i].printer) else {
                break;
            };
            let Some(target_printer) = state.printers.get(&entries[j].printer) else {
                break;
            };
            let swap_possible = entry_printer.compatible(piece.geometry_size(), piece.print_settings.as_ref())
                && target_printer.compatible(target_piece.geometry_size(), target_piece.print_settings.as_ref());
            let target_already_correct = filament_compatible(target_piece, target_printer);
            if swap_possible && !target_already_correct {
                let tmp = entries[i].printer;
                entries[i].printer = entries[j].printer;
                entries[j].printer = tmp;
            }
            break;
        }
    }
}

fn due_printers(entries: &[ScheduleEntry]) -> Vec<farm_core::PrinterId> {
    let mut seen = Vec::new();
    for e in entries {
        if !seen.contains(&e.printer) {
            seen.push(e.printer);
        }
    }
    seen
}

fn piece_id(entry: &ScheduleEntry) -> farm_core::PieceId {
    match entry.subject {
        ScheduleSubject::Piece(p) => p,
        ScheduleSubject::DeviceTask(_) => unreachable!("due_entries filters to Piece subjects"),
    }
}

fn filament_compatible(piece: &farm_core::Piece, printer: &Printer) -> bool {
    printer
        .filament
        .as_ref()
        .is_some_and(|f| f.compatible_with(&piece.colors, &piece.materials))
}

fn select_filament<'a>(piece: &farm_core::Piece, filaments: &'a std::collections::HashMap<farm_core::FilamentId, Filament>) -> Option<&'a Filament> {
    filaments
        .values()
        .find(|f| f.compatible_with(&piece.colors, &piece.materials))
}

/// Runs one dispatch pass over the latest schedule's due entries, mutating
/// `state` in place. Returns the ids of the device tasks launched this pass.
pub fn dispatch_due(state: &mut FarmState, now: DateTime<Utc>) -> Result<Vec<TaskId>, DispatcherError> {
    let Some(schedule_idx) = state.schedules.len().checked_sub(1) else {
        return Ok(Vec::new());
    };
    let mut entries = due_entries(&state.schedules[schedule_idx], now);
    if entries.is_empty() {
        return Ok(Vec::new());
    }

    let printers = due_printers(&entries);
    if entries.len() != printers.len() {
        return Err(DispatcherError::DuePrinterMismatch);
    }

    swap_to_avoid_filament_changes(&mut entries, state);

    let mut launched = Vec::new();
    let mut skipped = Vec::new();
    for entry in &entries {
        let piece_id = piece_id(entry);
        let Some(piece) = state.pieces.get(&piece_id).cloned() else {
            continue;
        };
        let Some(printer) = state.printers.get(&entry.printer).cloned() else {
            continue;
        };

        let filament = if filament_compatible(&piece, &printer) {
            printer.filament.clone()
        } else {
            select_filament(&piece, &state.filaments).cloned()
        };
        // No compatible filament anywhere in the fleet right now: skip this
        // entry and retry it next dispatch tick rather than abandoning the
        // rest of the pass, whose earlier mutations already landed.
        let Some(filament) = filament else {
            skipped.push(piece_id);
            continue;
        };

        let source = match &piece.source {
            PieceSource::Geometry { quote, .. } => {
                state
                    .slice_jobs
                    .entry(quote.id)
                    .or_insert_with(|| quote.clone());
                ProgramSource::Slice { slice_job: quote.id }
            }
            PieceSource::Program { file_name, .. } => ProgramSource::Ready {
                file_name: file_name.clone(),
            },
        };

        let controller = printer.controller;
        let needs_swap = printer.filament.as_ref().map(|f| f.id) != Some(filament.id);

        let program_dependency = if needs_swap {
            let fc_task_id = TaskId::new();
            let change = FilamentChange::new(filament.clone(), fc_task_id, now);
            let fc_task = farm_core::DeviceTask {
                id: fc_task_id,
                controller,
                kind: TaskKind::FilamentChange { change: change.id },
                dependency: None,
                status: farm_core::TaskStatus::Queued,
                sent: false,
                remote_filename: None,
            };
            state.filament_changes.insert(change.id, change);
            if let Some(ctrl) = state.controllers.get_mut(&controller) {
                ctrl.enqueue(fc_task_id);
            }
            state.tasks.insert(fc_task_id, fc_task);
            Some(fc_task_id)
        } else {
            None
        };

        let program_task = farm_core::DeviceTask::new(controller, TaskKind::Program { source }, program_dependency);

        if let Some(ctrl) = state.controllers.get_mut(&controller) {
            ctrl.enqueue(program_task.id);
        }
        launched.push(program_task.id);

        let print_job = PrintJob::new(program_task.id, filament, now);
        let unit_piece = UnitPiece {
            id: farm_core::UnitPieceId::new(),
            piece: piece_id,
            job: print_job.id,
        };
        state.print_jobs.insert(print_job.id, print_job);
        state.unit_pieces.push(unit_piece);
        state.tasks.insert(program_task.id, program_task);
    }

    if let Some(schedule) = state.schedules.get_mut(schedule_idx) {
        schedule.launched_tasks.extend(launched.iter().copied());
        for entry in &entries {
            if let Some(existing) = schedule.entries.iter_mut().find(|e| e.id == entry.id) {
                existing.printer = entry.printer;
            }
        }
    }

    if !skipped.is_empty() {
        tracing::warn!(pieces = ?skipped, "no compatible filament available, retrying next tick");
    }

    Ok(launched)
}
