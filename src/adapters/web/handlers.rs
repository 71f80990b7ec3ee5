//! HTTP request handlers for the web adapter.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::domain::audit::AuditEntry;
use crate::domain::error::TraderError;
use crate::domain::ledger::TradeRecord;
use crate::domain::portfolio::{summarize, RoundTrip};
use crate::domain::position::Position;
use crate::domain::schedule::EventKind;
use crate::ports::store_port::PositionStore;

use super::{AppState, WebError};

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn resolved(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: String,
}

/// Runs a store read on the blocking pool.
async fn read_store<T, F>(state: &AppState, read: F) -> Result<T, WebError>
where
    T: Send + 'static,
    F: FnOnce(&dyn PositionStore) -> Result<T, TraderError> + Send + 'static,
{
    let store = Arc::clone(&state.store);
    tokio::task::spawn_blocking(move || read(store.as_ref()))
        .await
        .map_err(|e| WebError::internal(format!("store read failed: {e}")))?
        .map_err(WebError::from)
}

fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn position_json(position: &Position) -> Value {
    match position {
        Position::Flat => json!({ "status": position.status().as_str() }),
        Position::Open(open) => json!({
            "status": position.status().as_str(),
            "instrument": open.instrument,
            "entry_price": open.entry_price,
            "entry_time": ts(&open.entry_time),
            "quantity": open.quantity,
        }),
    }
}

fn trade_json(record: &TradeRecord) -> Value {
    json!({
        "id": record.id,
        "action": record.action.as_str(),
        "instrument": record.instrument,
        "price": record.price,
        "quantity": record.quantity,
        "timestamp": ts(&record.timestamp),
        "trigger_kind": record.trigger_kind.as_str(),
    })
}

fn round_trip_json(trip: &RoundTrip) -> Value {
    json!({
        "buy_id": trip.buy_id,
        "sell_id": trip.sell_id,
        "instrument": trip.instrument,
        "quantity": trip.quantity,
        "entry_price": trip.entry_price,
        "exit_price": trip.exit_price,
        "entry_time": ts(&trip.entry_time),
        "exit_time": ts(&trip.exit_time),
        "pnl": trip.pnl,
    })
}

fn audit_json(entry: &AuditEntry) -> Value {
    json!({
        "id": entry.id,
        "recorded_at": ts(&entry.recorded_at),
        "kind": entry.kind.as_str(),
        "trigger_kind": entry.trigger.map(|t| t.as_str()),
        "event": entry.event.map(|e| e.as_str()),
        "due_at": entry.due_at.as_ref().map(ts),
        "detail": entry.detail,
    })
}

/// # GET /api
pub async fn api_index() -> Json<Value> {
    Json(json!({
        "ok": true,
        "mode": "paper",
        "endpoints": [
            "GET /status",
            "GET /trade-history?limit=N",
            "GET /round-trips",
            "GET /audit?limit=N",
            "POST /paper/reset",
        ],
    }))
}

/// # GET /status
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<Value>, WebError> {
    let now = state.clock.now();
    let halted = state
        .engine
        .lock()
        .await
        .halted_reason()
        .map(str::to_string);

    let snapshot = read_store(&state, |store| store.snapshot()).await?;
    let account = summarize(&snapshot.ledger, &snapshot.position, state.starting_cash);
    let next_runs: Vec<Value> = state
        .schedule
        .upcoming(now, 4)
        .iter()
        .map(|e| json!({ "event": e.kind.as_str(), "due_at": ts(&e.due_at) }))
        .collect();

    Ok(Json(json!({
        "ok": true,
        "mode": "paper",
        "now": ts(&now),
        "halted": halted,
        "position": position_json(&snapshot.position),
        "watermark": snapshot.watermark.as_ref().map(ts),
        "trades": snapshot.ledger.len(),
        "next_buy": state.schedule.next_of(EventKind::BuyWindow, now).as_ref().map(ts),
        "next_sell": state.schedule.next_of(EventKind::SellWindow, now).as_ref().map(ts),
        "next_runs": next_runs,
        "account": {
            "starting_cash": account.starting_cash,
            "cash": account.cash,
            "realized_pnl": account.realized_pnl,
            "book_equity": account.book_equity(),
            "round_trips": account.round_trips.len(),
            "wins": account.win_count(),
        },
    })))
}

/// # GET /trade-history
pub async fn trade_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Value>, WebError> {
    let limit = query.resolved();
    let trades: Vec<Value> = read_store(&state, move |store| store.recent_trades(limit))
        .await?
        .iter()
        .map(trade_json)
        .collect();
    Ok(Json(json!({ "ok": true, "trades": trades })))
}

/// # GET /round-trips
pub async fn round_trips(State(state): State<Arc<AppState>>) -> Result<Json<Value>, WebError> {
    let snapshot = read_store(&state, |store| store.snapshot()).await?;
    let account = summarize(&snapshot.ledger, &snapshot.position, state.starting_cash);
    let trips: Vec<Value> = account.round_trips.iter().map(round_trip_json).collect();
    let curve: Vec<Value> = account
        .equity_curve
        .iter()
        .map(|p| json!({ "time": ts(&p.time), "equity": p.equity }))
        .collect();
    Ok(Json(json!({
        "ok": true,
        "round_trips": trips,
        "realized_pnl": account.realized_pnl,
        "equity_curve": curve,
    })))
}

/// # GET /audit
pub async fn audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Value>, WebError> {
    let limit = query.resolved();
    let entries: Vec<Value> = read_store(&state, move |store| store.recent_audit(limit))
        .await?
        .iter()
        .map(audit_json)
        .collect();
    Ok(Json(json!({ "ok": true, "entries": entries })))
}

/// # POST /paper/reset
///
/// Takes the engine lock, so a reset never interleaves with a tick.
pub async fn reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<Value>, WebError> {
    let now = state.clock.now();
    let report = state.engine.lock().await.reset(&request.confirm, now)?;
    Ok(Json(json!({
        "ok": true,
        "trades_removed": report.trades_removed,
        "at": ts(&report.at),
    })))
}

pub async fn not_found() -> WebError {
    WebError::new(axum::http::StatusCode::NOT_FOUND, "no such endpoint")
}
