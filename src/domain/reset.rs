//! Administrative reset of the paper account.

use chrono::{DateTime, Utc};
use tracing::warn;

use super::audit::{AuditKind, NewAuditEntry};
use super::error::TraderError;
use super::ledger::TriggerKind;
use crate::ports::store_port::PositionStore;

/// Word the caller must pass to confirm a reset.
pub const RESET_CONFIRMATION: &str = "RESET";

#[derive(Debug, Clone, PartialEq)]
pub struct ResetReport {
    pub trades_removed: usize,
    pub at: DateTime<Utc>,
}

/// Truncates the ledger and forces the position flat, atomically.
///
/// Events due before `now` will not fire afterwards: the watermark moves to
/// `now` in the same transaction.
pub fn reset_paper_account(
    store: &dyn PositionStore,
    confirmation: &str,
    now: DateTime<Utc>,
) -> Result<ResetReport, TraderError> {
    if confirmation != RESET_CONFIRMATION {
        return Err(TraderError::ResetNotConfirmed {
            expected: RESET_CONFIRMATION,
        });
    }

    let entry = NewAuditEntry::new(AuditKind::Reset, now, "ledger truncated, position flat")
        .triggered_by(TriggerKind::ManualReset);
    let trades_removed = store.reset(&entry, now)?;
    warn!(trades_removed, "paper account reset");

    Ok(ResetReport {
        trades_removed,
        at: now,
    })
}
