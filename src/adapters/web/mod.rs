//! Web server adapter.
//!
//! Read-only JSON views of the paper account plus the reset endpoint. No
//! route places orders; trades come only from the scheduler.

mod error;
mod handlers;

pub use error::{status_from_error, WebError};
pub use handlers::*;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::domain::engine::TradeEngine;
use crate::domain::schedule::Schedule;
use crate::ports::clock_port::Clock;
use crate::ports::store_port::PositionStore;

pub struct AppState {
    pub engine: Arc<Mutex<TradeEngine>>,
    pub store: Arc<dyn PositionStore>,
    pub schedule: Schedule,
    pub starting_cash: f64,
    pub clock: Arc<dyn Clock>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api", get(handlers::api_index))
        .route("/status", get(handlers::status))
        .route("/trade-history", get(handlers::trade_history))
        .route("/round-trips", get(handlers::round_trips))
        .route("/audit", get(handlers::audit))
        .route("/paper/reset", post(handlers::reset))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
