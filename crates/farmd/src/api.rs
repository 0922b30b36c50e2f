//! Operator REST surface: fleet inspection plus the handful of POST
//! endpoints that resolve a human-intervention gate.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use farm_core::{Configuration, FilamentChangeId, OrderId, Piece, PieceId, PieceSource, PrinterId, PrintJobId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use farm_engine::periodic::SharedTickHealth;
use farm_engine::FarmState;

#[derive(Clone)]
pub struct ApiState {
    pub farm: Arc<RwLock<FarmState>>,
    pub health: SharedTickHealth,
    pub config: Configuration,
}

pub fn router(farm: Arc<RwLock<FarmState>>, health: SharedTickHealth, config: Configuration) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/printers", get(list_printers))
        .route("/pending_filament_changes", get(pending_filament_changes))
        .route(
            "/print_jobs_pending_for_confirmation",
            get(print_jobs_pending_for_confirmation),
        )
        .route(
            "/operations/confirm_filament_change/{id}",
            post(confirm_filament_change),
        )
        .route("/operations/confirm_job_result/{id}", post(confirm_job_result))
        .route("/operations/cancel_active_task/{id}", post(cancel_active_task))
        .route("/operations/reset_printer/{id}", post(reset_printer))
        .route(
            "/operations/toggle_printer_en_dis/{id}",
            post(toggle_printer_en_dis),
        )
        .route("/orders", post(create_order))
        .layer(TraceLayer::new_for_http())
        .with_state(ApiState { farm, health, config })
}

#[derive(Serialize)]
struct HealthzResponse {
    healthy: bool,
    overdue_ticks: Vec<&'static str>,
}

async fn healthz(State(state): State<ApiState>) -> impl IntoResponse {
    let overdue_ticks = state
        .health
        .lock()
        .expect("tick health lock poisoned")
        .overdue_ticks(&state.config);
    let healthy = overdue_ticks.is_empty();
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(HealthzResponse { healthy, overdue_ticks }))
}

#[derive(Serialize)]
struct PrinterView {
    id: PrinterId,
    name: String,
    disabled: bool,
    connection_ready: bool,
    printer_ready: bool,
    awaiting_human: bool,
    time_left: Option<u64>,
}

async fn list_printers(State(state): State<ApiState>) -> Json<Vec<PrinterView>> {
    let now = Utc::now();
    let guard = state.farm.read().await;
    let tasks = guard.tasks_slice();
    let jobs = guard.print_jobs_slice();
    let changes = guard.filament_changes_slice();

    let views = guard
        .printers
        .values()
        .map(|printer| {
            let ctrl = guard.controllers.get(&printer.controller);
            let connection_ready = ctrl.is_some_and(|c| c.connection_ready());
            let printer_ready = ctrl.is_some_and(|c| c.printer_ready(&tasks, &jobs, &changes));
            let awaiting_human = ctrl.is_some_and(|c| c.awaiting_human(&tasks, &jobs, &changes));
            let time_left = ctrl.and_then(|c| farm_engine::task_runner::time_left(&guard, c, &changes, now));
            PrinterView {
                id: printer.id,
                name: printer.name.clone(),
                disabled: printer.disabled,
                connection_ready,
                printer_ready,
                awaiting_human,
                time_left,
            }
        })
        .collect();
    Json(views)
}

#[derive(Serialize)]
struct FilamentChangeView {
    id: FilamentChangeId,
    new_filament_name: String,
    created: chrono::DateTime<Utc>,
}

async fn pending_filament_changes(State(state): State<ApiState>) -> Json<Vec<FilamentChangeView>> {
    let guard = state.farm.read().await;
    let views = guard
        .filament_changes
        .values()
        .filter(|c| !c.confirmed)
        .map(|c| FilamentChangeView {
            id: c.id,
            new_filament_name: c.new_filament.name.clone(),
            created: c.created,
        })
        .collect();
    Json(views)
}

#[derive(Serialize)]
struct PrintJobView {
    id: PrintJobId,
    task: farm_core::TaskId,
    filament_name: String,
    created: chrono::DateTime<Utc>,
}

async fn print_jobs_pending_for_confirmation(State(state): State<ApiState>) -> Json<Vec<PrintJobView>> {
    let guard = state.farm.read().await;
    let views = guard
        .print_jobs
        .values()
        .filter(|job| {
            let task_ready = guard.task_ready(job.task);
            job.awaiting_bed_removal(task_ready)
        })
        .map(|job| PrintJobView {
            id: job.id,
            task: job.task,
            filament_name: job.filament.name.clone(),
            created: job.created,
        })
        .collect();
    Json(views)
}

async fn confirm_filament_change(
    State(state): State<ApiState>,
    Path(id): Path<uuid::Uuid>,
) -> impl IntoResponse {
    let id = FilamentChangeId(id);
    let now = Utc::now();
    let mut guard = state.farm.write().await;
    let Some(change) = guard.filament_changes.get_mut(&id) else {
        return StatusCode::NOT_FOUND;
    };
    change.confirm(now);
    let new_filament = change.new_filament.clone();
    if let Some(controller) = guard
        .tasks
        .values()
        .find(|t| matches!(&t.kind, farm_core::TaskKind::FilamentChange { change: c } if *c == id))
        .map(|task| task.controller)
    {
        if let Some(printer) = guard
            .printers
            .values_mut()
            .find(|p| p.controller == controller)
        {
            printer.filament = Some(new_filament);
        }
    }
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct ConfirmJobResultBody {
    success: bool,
}

async fn confirm_job_result(
    State(state): State<ApiState>,
    Path(id): Path<uuid::Uuid>,
    Json(body): Json<ConfirmJobResultBody>,
) -> impl IntoResponse {
    let id = PrintJobId(id);
    let now = Utc::now();
    let mut guard = state.farm.write().await;
    let Some(job) = guard.print_jobs.get_mut(&id) else {
        return StatusCode::NOT_FOUND;
    };
    job.confirm_result(body.success, now);
    StatusCode::NO_CONTENT
}

async fn cancel_active_task(State(state): State<ApiState>, Path(id): Path<uuid::Uuid>) -> impl IntoResponse {
    let id = PrinterId(id);
    let mut guard = state.farm.write().await;
    let Some(controller_id) = guard.printers.get(&id).map(|p| p.controller) else {
        return StatusCode::NOT_FOUND;
    };
    farm_engine::task_runner::cancel_active_task(&mut guard, controller_id, true, Utc::now()).await;
    StatusCode::NO_CONTENT
}

async fn reset_printer(State(state): State<ApiState>, Path(id): Path<uuid::Uuid>) -> impl IntoResponse {
    let id = PrinterId(id);
    let mut guard = state.farm.write().await;
    let Some(controller_id) = guard.printers.get(&id).map(|p| p.controller) else {
        return StatusCode::NOT_FOUND;
    };
    let Some(ctrl) = guard.controllers.get_mut(&controller_id) else {
        return StatusCode::NOT_FOUND;
    };
    ctrl.reset();
    StatusCode::NO_CONTENT
}

async fn toggle_printer_en_dis(State(state): State<ApiState>, Path(id): Path<uuid::Uuid>) -> impl IntoResponse {
    let id = PrinterId(id);
    let mut guard = state.farm.write().await;
    let Some(printer) = guard.printers.get_mut(&id) else {
        return StatusCode::NOT_FOUND;
    };
    printer.disabled = !printer.disabled;
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct CreateOrderBody {
    client: String,
    due_date: chrono::NaiveDate,
    #[serde(default)]
    priority: u8,
    pieces: Vec<CreatePieceBody>,
}

#[derive(Deserialize)]
struct CreatePieceBody {
    file_name: String,
    #[serde(default = "default_copies")]
    copies: u32,
    #[serde(default = "default_scale")]
    scale: f64,
    estimated_build_time_s: Option<u64>,
    estimated_weight_g: Option<f64>,
    materials: Vec<farm_core::Material>,
    colors: Vec<farm_core::Color>,
}

fn default_copies() -> u32 {
    1
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Serialize)]
struct CreateOrderResponse {
    order: OrderId,
    pieces: Vec<PieceId>,
}

/// Minimal storefront-ingestion endpoint: constructs an `Order` plus its
/// `Piece`s from already-uploaded program files. Geometry-based pieces (the
/// slice-then-program path) are out of scope for this endpoint; attribute
/// terms beyond filename/copies/scale are left to richer ingestion this
/// coordinator doesn't own. Every piece is validated (`Piece::new` rejects
/// an empty color or material set) before anything is written to state, so
/// a bad piece in the batch never leaves a partially-created order behind.
async fn create_order(
    State(state): State<ApiState>,
    Json(body): Json<CreateOrderBody>,
) -> impl IntoResponse {
    let order_id = OrderId::new();
    let pieces: Result<Vec<Piece>, farm_core::CoreError> = body
        .pieces
        .into_iter()
        .map(|piece| {
            Piece::new(
                PieceId::new(),
                order_id,
                PieceSource::Program {
                    file_name: piece.file_name,
                    quote: farm_core::ProgramQuote {
                        ready: piece.estimated_build_time_s.is_some(),
                        build_time_s: piece.estimated_build_time_s,
                        weight_g: piece.estimated_weight_g,
                    },
                },
                piece.copies,
                piece.scale,
                piece.materials,
                piece.colors,
                None,
            )
        })
        .collect();
    let pieces = match pieces {
        Ok(pieces) => pieces,
        Err(err) => return (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()).into_response(),
    };

    let order = farm_core::Order {
        id: order_id,
        client: body.client,
        due_date: body.due_date,
        priority: body.priority,
    };

    let mut guard = state.farm.write().await;
    let piece_ids: Vec<PieceId> = pieces.iter().map(|p| p.id).collect();
    for piece in pieces {
        guard.pieces.insert(piece.id, piece);
    }
    guard.orders.insert(order.id, order);

    (
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order: order_id,
            pieces: piece_ids,
        }),
    )
        .into_response()
}
