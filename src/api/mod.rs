// HTTP API routes (battle royale, labels, info, accounts).

pub mod ws;

use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::arena::{Arena, ArenaError, LobbyResult};
use crate::config::Config;
use crate::db::Database;
use crate::flavor::Flavor;
use crate::info::{self, InfoError};
use crate::labels::{self, LabelError, LabelWrite, Labels};
use crate::ledger::{Ledger, LedgerError};
use crate::metrics;

// ── Request types ─────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct StartBattleRequest {
    pub user: String,
    pub bet: i64,
}

#[derive(Deserialize)]
pub struct UserRequest {
    pub user: String,
}

#[derive(Deserialize)]
pub struct SetLabelRequest {
    pub user: String,
    pub value: String,
}

#[derive(Deserialize)]
pub struct UserParams {
    pub user: Option<String>,
}

#[derive(Deserialize)]
pub struct AddShortcutRequest {
    pub user: String,
    pub shortcut: String,
    pub name: String,
}

// ── Shared application state ─────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<Database>,
    pub ledger: Ledger,
    pub labels: Labels,
    pub arena: Arc<Arena>,
}

impl AppState {
    pub fn new(config: Config, db: Arc<Database>, flavor: Flavor) -> Self {
        let ledger = Ledger::new(db.clone(), config.starting_balance);
        let arena = Arena::new(
            config.battle.clone(),
            flavor,
            config.currency_name.clone(),
            ledger.clone(),
        );
        Self {
            config: Arc::new(config),
            labels: Labels::new(db.clone()),
            db,
            ledger,
            arena: Arc::new(arena),
        }
    }
}

// ── Error helpers ─────────────────────────────────────────────────────

fn json_error(status: StatusCode, msg: &str) -> impl IntoResponse {
    (status, Json(json!({ "error": msg })))
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    tracing::error!("Internal error: {e}");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}

fn ledger_error(e: LedgerError) -> Response {
    match e {
        LedgerError::InsufficientFunds { .. } => {
            json_error(StatusCode::BAD_REQUEST, &e.to_string()).into_response()
        }
        LedgerError::UnknownAccount(_) => {
            json_error(StatusCode::NOT_FOUND, &e.to_string()).into_response()
        }
        LedgerError::Database(e) => internal_error(e),
    }
}

fn arena_error(e: ArenaError) -> Response {
    let status = match e {
        ArenaError::Ledger(inner) => return ledger_error(inner),
        ArenaError::Simulation(inner) => return internal_error(inner),
        ArenaError::BetTooLow { .. } | ArenaError::BetTooHigh { .. } => StatusCode::BAD_REQUEST,
        ArenaError::AlreadyRunning
        | ArenaError::LobbyClosed
        | ArenaError::AlreadyJoined(_)
        | ArenaError::NotRunning => StatusCode::CONFLICT,
        ArenaError::UnknownLobby(_) => StatusCode::NOT_FOUND,
    };
    json_error(status, &e.to_string()).into_response()
}

fn label_error(e: LabelError) -> Response {
    match e {
        LabelError::Uppercase(_) | LabelError::Empty => {
            json_error(StatusCode::BAD_REQUEST, &e.to_string()).into_response()
        }
        LabelError::NotFound(_) => json_error(StatusCode::NOT_FOUND, &e.to_string()).into_response(),
        LabelError::Database(e) => internal_error(e),
    }
}

// ── Router ────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(get_metrics))
        // Info
        .route("/api/info", get(get_info))
        .route("/api/time", get(get_time))
        .route("/api/shortcuts", get(list_shortcuts).post(add_shortcut))
        // Labels
        .route("/api/labels", get(list_labels))
        .route(
            "/api/labels/{label}",
            get(show_label).put(set_label).delete(delete_label),
        )
        // Battle royale
        .route("/api/battleroyale", get(battle_status).post(start_battle))
        .route("/api/battleroyale/join", post(join_battle))
        .route("/api/battleroyale/stop", post(stop_battle))
        // Economy
        .route("/api/accounts/{user}", get(get_account))
        .route("/api/records", get(list_records))
        // WebSocket
        .route("/ws/battleroyale", get(ws::ws_battleroyale))
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "ok", "service": "economy-backend" }))
}

async fn get_metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}

// ── Info handlers ─────────────────────────────────────────────────────

async fn get_info(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({ "text": info::info_text(&state.config) })),
    )
}

async fn get_time(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Local::now();
    (
        StatusCode::OK,
        Json(json!({ "text": info::time_text(&now, &state.config.timezone) })),
    )
}

async fn list_shortcuts(State(state): State<AppState>) -> impl IntoResponse {
    match state.db.list_shortcuts().await {
        Ok(shortcuts) => {
            let text = info::shortcuts_table(&shortcuts);
            (
                StatusCode::OK,
                Json(json!({ "shortcuts": shortcuts, "text": text })),
            )
                .into_response()
        }
        Err(e) => internal_error(e),
    }
}

async fn add_shortcut(
    State(state): State<AppState>,
    Json(req): Json<AddShortcutRequest>,
) -> impl IntoResponse {
    match info::add_shortcut(&state.config, &state.db, &req.user, &req.shortcut, &req.name).await
    {
        Ok(message) => (StatusCode::CREATED, Json(json!({ "message": message }))).into_response(),
        Err(e @ InfoError::NotAdmin(_)) => {
            json_error(StatusCode::FORBIDDEN, &e.to_string()).into_response()
        }
        Err(e @ InfoError::EmptyShortcut) => {
            json_error(StatusCode::BAD_REQUEST, &e.to_string()).into_response()
        }
        Err(InfoError::Database(e)) => internal_error(e),
    }
}

// ── Label handlers ────────────────────────────────────────────────────

async fn list_labels(State(state): State<AppState>) -> impl IntoResponse {
    match state.labels.names().await {
        Ok(names) => {
            let messages = labels::listing_messages(&names);
            (
                StatusCode::OK,
                Json(json!({ "labels": names, "messages": messages })),
            )
                .into_response()
        }
        Err(e) => label_error(e),
    }
}

async fn show_label(State(state): State<AppState>, Path(label): Path<String>) -> impl IntoResponse {
    match state.labels.show(&label).await {
        Ok(value) => (
            StatusCode::OK,
            Json(json!({ "label": label, "value": value })),
        )
            .into_response(),
        Err(e) => label_error(e),
    }
}

async fn set_label(
    State(state): State<AppState>,
    Path(label): Path<String>,
    Json(req): Json<SetLabelRequest>,
) -> impl IntoResponse {
    match state.labels.set(&label, &req.value).await {
        Ok(write) => {
            let status = match write {
                LabelWrite::Created => StatusCode::CREATED,
                LabelWrite::Updated => StatusCode::OK,
            };
            (
                status,
                Json(json!({
                    "label": label,
                    "action": write,
                    "message": write.message(&req.user, &label),
                })),
            )
                .into_response()
        }
        Err(e) => label_error(e),
    }
}

async fn delete_label(
    State(state): State<AppState>,
    Path(label): Path<String>,
    Query(params): Query<UserParams>,
) -> impl IntoResponse {
    match state.labels.delete(&label).await {
        Ok(()) => {
            let user = params.user.unwrap_or_else(|| "Someone".to_string());
            (
                StatusCode::OK,
                Json(json!({
                    "message": format!("**[INFO]** {user} has deleted the label {label}.")
                })),
            )
                .into_response()
        }
        Err(e) => label_error(e),
    }
}

// ── Battle royale handlers ────────────────────────────────────────────

async fn battle_status(State(state): State<AppState>) -> impl IntoResponse {
    let lobby = state.arena.status().await;
    (StatusCode::OK, Json(json!({ "lobby": lobby })))
}

async fn start_battle(
    State(state): State<AppState>,
    Json(req): Json<StartBattleRequest>,
) -> impl IntoResponse {
    if req.user.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "user is required").into_response();
    }
    let lobby = match state.arena.start(&req.user, req.bet).await {
        Ok(lobby) => lobby,
        Err(e) => return arena_error(e),
    };

    let arena = state.arena.clone();
    let id = lobby.id;
    tokio::spawn(async move {
        match arena.run_lobby(id).await {
            Ok(LobbyResult::Finished { outcome, settlement }) => {
                if !settlement.is_clean() {
                    tracing::warn!(
                        lobby = %id,
                        failures = settlement.failures.len(),
                        "Battle royale settled with failures"
                    );
                }
                tracing::debug!(lobby = %id, winner = %outcome.winner, "Lobby task finished");
            }
            Ok(LobbyResult::Cancelled { .. }) | Ok(LobbyResult::Stopped { .. }) => {
                tracing::debug!(lobby = %id, "Lobby task ended without a battle");
            }
            Err(e) => tracing::error!(lobby = %id, "Lobby task failed: {e}"),
        }
    });

    (
        StatusCode::CREATED,
        Json(json!({
            "lobby": lobby,
            "message": "Battle royale lobby opened. Connect to /ws/battleroyale for live updates."
        })),
    )
        .into_response()
}

async fn join_battle(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> impl IntoResponse {
    if req.user.trim().is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "user is required").into_response();
    }
    match state.arena.join(&req.user).await {
        Ok(lobby) => (StatusCode::OK, Json(json!({ "lobby": lobby }))).into_response(),
        Err(e) => arena_error(e),
    }
}

async fn stop_battle(
    State(state): State<AppState>,
    Json(req): Json<UserRequest>,
) -> impl IntoResponse {
    if !state.config.is_admin(&req.user) {
        return json_error(StatusCode::FORBIDDEN, "Only admins can stop a battle royale")
            .into_response();
    }
    match state.arena.stop().await {
        Ok(id) => (
            StatusCode::OK,
            Json(json!({ "status": "stopping", "lobby": id })),
        )
            .into_response(),
        Err(e) => arena_error(e),
    }
}

// ── Economy handlers ──────────────────────────────────────────────────

async fn get_account(State(state): State<AppState>, Path(user): Path<String>) -> impl IntoResponse {
    match state.ledger.account(&user).await {
        Ok(account) => (StatusCode::OK, Json(json!(account))).into_response(),
        Err(e) => ledger_error(e),
    }
}

async fn list_records(State(state): State<AppState>) -> impl IntoResponse {
    match state.ledger.records().await {
        Ok(records) => (StatusCode::OK, Json(json!(records))).into_response(),
        Err(e) => ledger_error(e),
    }
}
