//! The three periodic services, the watchdog that observes them, and the
//! `tokio::select!` loop that drives all four.
//!
//! Modeled on the reference client's coordinator loop
//! (`examples/hoffmang9-WesoForge/crates/client/src/main.rs`): one `select!`
//! over independent interval tickers plus a shutdown channel, rather than
//! three separately-spawned tasks racing on shared state.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use farm_core::Configuration;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};

use crate::state::FarmState;
use crate::{dispatcher, scheduler, task_runner};

/// How many multiples of its own period a tick may run late before the
/// watchdog calls it stalled.
const WATCHDOG_OVERRUN_MULTIPLE: u32 = 3;

/// Wall-clock timestamps of each periodic service's most recent completed
/// tick. Shared between the control loop (writer) and the operator health
/// endpoint (reader) behind an `Arc<Mutex<_>>` — updates are a handful of
/// `Instant` writes once per tick, cheap enough that a blocking mutex beats
/// routing this through the `FarmState` lock.
#[derive(Debug, Default)]
pub struct TickHealth {
    poll: Option<Instant>,
    dispatch: Option<Instant>,
    scheduler: Option<Instant>,
}

pub type SharedTickHealth = Arc<Mutex<TickHealth>>;

impl TickHealth {
    fn overdue(last: Option<Instant>, period: Duration) -> bool {
        match last {
            None => true,
            Some(t) => t.elapsed() > period * WATCHDOG_OVERRUN_MULTIPLE,
        }
    }

    /// Names of ticks that haven't completed within `WATCHDOG_OVERRUN_MULTIPLE`x
    /// their configured period.
    pub fn overdue_ticks(&self, config: &Configuration) -> Vec<&'static str> {
        let mut stale = Vec::new();
        if Self::overdue(self.poll, config.poller_period) {
            stale.push("poller");
        }
        if Self::overdue(self.dispatch, config.dispatch_period) {
            stale.push("dispatcher");
        }
        if Self::overdue(self.scheduler, config.scheduler_period) {
            stale.push("scheduler");
        }
        stale
    }

    pub fn healthy(&self, config: &Configuration) -> bool {
        self.overdue_ticks(config).is_empty()
    }
}

/// Polls every controller's device host and folds the result into its status
/// cache. Connection failures are recorded, not propagated: a printer that
/// stops answering simply drops out of `enabled_printers()` until it recovers.
async fn poll_tick(state: &Arc<RwLock<FarmState>>, health: &SharedTickHealth) {
    let controller_ids: Vec<_> = {
        let guard = state.read().await;
        guard.controllers.keys().copied().collect()
    };

    for id in controller_ids {
        let client = {
            let guard = state.read().await;
            guard.controllers.get(&id).map(|c| c.client.clone())
        };
        let Some(client) = client else { continue };

        let printer_state = client.fetch_printer_state().await;
        let job_state = client.fetch_job_state().await;
        let now = Utc::now();

        let mut guard = state.write().await;
        match (printer_state, job_state) {
            (Ok(p), Ok(j)) => {
                if let Some(ctrl) = guard.controllers.get_mut(&id) {
                    ctrl.apply_poll(p, j, now);
                }
            }
            _ => {
                if let Some(ctrl) = guard.controllers.get_mut(&id) {
                    ctrl.mark_connection_error();
                }
            }
        }
        task_runner::poll_active(&mut guard, id, now);
    }

    health.lock().expect("tick health lock poisoned").poll = Some(Instant::now());
}

/// Promotes queued work onto idle controllers and dispatches the active task
/// of any controller that hasn't sent it yet. Also advances the
/// buzzer-poke heuristic for controllers stuck awaiting human intervention.
async fn dispatch_tick(state: &Arc<RwLock<FarmState>>, config: &Configuration, health: &SharedTickHealth) {
    let controller_ids: Vec<_> = {
        let guard = state.read().await;
        guard.controllers.keys().copied().collect()
    };

    for id in controller_ids {
        let now = Utc::now();
        let mut guard = state.write().await;
        let tasks = guard.tasks_slice();
        let jobs = guard.print_jobs_slice();
        let changes = guard.filament_changes_slice();

        let awaiting_human = guard
            .controllers
            .get(&id)
            .is_some_and(|c| c.awaiting_human(&tasks, &jobs, &changes));
        if let Some(ctrl) = guard.controllers.get_mut(&id) {
            if awaiting_human {
                ctrl.notification_count += 1;
                if ctrl.notification_count % config.beep_threshold_count.max(1) == 0 {
                    tracing::warn!(printer = %ctrl.printer, count = ctrl.notification_count, "awaiting human intervention");
                }
            } else {
                ctrl.notification_count = 0;
            }
        }

        if let Some(ctrl) = guard.controllers.get_mut(&id) {
            if ctrl.active.is_none() {
                ctrl.promote_next(&tasks, &jobs, &changes);
            }
        }

        task_runner::dispatch_active(&mut guard, id, &config.program_storage_dir, now).await;
    }

    health.lock().expect("tick health lock poisoned").dispatch = Some(Instant::now());
}

/// Builds a fresh schedule once the previous one is ready, then runs one
/// dispatch pass over its due entries.
async fn scheduler_tick(state: &Arc<RwLock<FarmState>>, config: &Configuration, health: &SharedTickHealth) {
    let now = Utc::now();
    let mut guard = state.write().await;

    let ready = guard.latest_schedule().map_or(true, |s| s.ready());
    if !ready {
        return;
    }

    let pieces = guard.placeable_pieces();
    let jobs = guard.print_jobs_slice();
    let unit_pieces = guard.unit_pieces.clone();
    let printers = guard.enabled_printers();
    let changes = guard.filament_changes_slice();

    let mut busy_until = std::collections::HashMap::new();
    for printer in &printers {
        let Some(ctrl) = guard.controllers.get(&printer.controller) else {
            continue;
        };
        if ctrl.active.is_none() {
            continue;
        }
        if let Some(secs) = task_runner::time_left(&guard, ctrl, &changes, now) {
            busy_until.insert(printer.id, now + chrono::Duration::seconds(secs as i64));
        }
    }

    let schedule = scheduler::build_schedule(
        &pieces,
        &unit_pieces,
        &jobs,
        &printers,
        &guard.orders,
        &busy_until,
        config,
        now,
    );
    drop(pieces);
    drop(printers);

    match schedule {
        Ok(schedule) => {
            guard.schedules.push(schedule);
            if let Err(err) = dispatcher::dispatch_due(&mut guard, now) {
                tracing::warn!(error = %err, "dispatch pass failed");
            }
        }
        Err(err) => tracing::warn!(error = %err, "scheduler pass skipped"),
    }

    health.lock().expect("tick health lock poisoned").scheduler = Some(Instant::now());
}

/// Runs until `shutdown` reports `true`, driving the three periodic services
/// plus the watchdog off their own interval tickers in a single `select!`.
/// `health` is read by the operator `/healthz` endpoint; `run` only writes to it.
pub async fn run(
    state: Arc<RwLock<FarmState>>,
    config: Configuration,
    mut shutdown: watch::Receiver<bool>,
    health: SharedTickHealth,
) {
    let mut poller = interval(config.poller_period);
    let mut dispatcher_ticker = interval(config.dispatch_period);
    let mut scheduler_ticker = interval(config.scheduler_period);
    let mut watchdog_ticker = interval(config.poller_period);
    for t in [
        &mut poller,
        &mut dispatcher_ticker,
        &mut scheduler_ticker,
        &mut watchdog_ticker,
    ] {
        t.set_missed_tick_behavior(MissedTickBehavior::Delay);
    }

    loop {
        tokio::select! {
            _ = poller.tick() => {
                poll_tick(&state, &health).await;
            }
            _ = dispatcher_ticker.tick() => {
                dispatch_tick(&state, &config, &health).await;
            }
            _ = scheduler_ticker.tick() => {
                scheduler_tick(&state, &config, &health).await;
            }
            _ = watchdog_ticker.tick() => {
                let overdue = health.lock().expect("tick health lock poisoned").overdue_ticks(&config);
                if !overdue.is_empty() {
                    tracing::warn!(ticks = ?overdue, "periodic tick overdue by more than 3x its period");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("control loop shutting down");
                    break;
                }
            }
        }
    }
}
