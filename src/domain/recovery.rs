//! Startup reconciliation of position, ledger and watermark.
//!
//! The ledger wins: a position row that disagrees with the ledger's last
//! action is rebuilt from the ledger. A ledger that does not alternate cannot
//! be repaired and is reported as an integrity error.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::audit::{AuditKind, NewAuditEntry};
use super::error::TraderError;
use super::ledger::{implied_position, validate_alternation};
use super::position::Position;
use crate::ports::store_port::{PositionStore, StoreSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryReport {
    pub position: Position,
    pub repaired: bool,
    pub trades: usize,
    pub watermark: DateTime<Utc>,
}

/// Stored watermark, else the last trade time, else process start.
pub fn recovered_watermark(snapshot: &StoreSnapshot, process_start: DateTime<Utc>) -> DateTime<Utc> {
    snapshot
        .watermark
        .or_else(|| snapshot.ledger.last().map(|r| r.timestamp))
        .unwrap_or(process_start)
}

pub fn reconcile(
    store: &dyn PositionStore,
    process_start: DateTime<Utc>,
) -> Result<RecoveryReport, TraderError> {
    let snapshot = store.snapshot()?;
    validate_alternation(&snapshot.ledger)?;

    let implied = implied_position(&snapshot.ledger);
    let repaired = snapshot.position != implied;
    if repaired {
        let detail = format!(
            "position was {} but ledger of {} trades implies {}",
            snapshot.position.status(),
            snapshot.ledger.len(),
            implied.status()
        );
        warn!(%detail, "repairing position from ledger");
        store.repair_position(
            &implied,
            &NewAuditEntry::new(AuditKind::Repaired, process_start, detail),
        )?;
    }

    let watermark = store.advance_watermark(recovered_watermark(&snapshot, process_start))?;
    info!(
        trades = snapshot.ledger.len(),
        status = %implied.status(),
        %watermark,
        repaired,
        "recovered state"
    );

    Ok(RecoveryReport {
        position: implied,
        repaired,
        trades: snapshot.ledger.len(),
        watermark,
    })
}
