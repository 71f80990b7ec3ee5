//! Durable position store port.

use chrono::{DateTime, Utc};

use crate::domain::audit::{AuditEntry, NewAuditEntry};
use crate::domain::error::TraderError;
use crate::domain::ledger::{NewTrade, TradeRecord};
use crate::domain::position::Position;

/// Position, ledger and watermark read in one transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot {
    pub position: Position,
    pub ledger: Vec<TradeRecord>,
    pub watermark: Option<DateTime<Utc>>,
}

/// Source of truth for flat vs open.
///
/// Every mutating method is one atomic unit. The watermark never moves
/// backwards: implementations keep the later of the stored and given value.
pub trait PositionStore: Send + Sync {
    fn load_position(&self) -> Result<Position, TraderError>;

    /// Whole ledger, oldest first.
    fn load_ledger(&self) -> Result<Vec<TradeRecord>, TraderError>;

    /// At most `limit` trades, newest first.
    fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>, TraderError>;

    fn load_watermark(&self) -> Result<Option<DateTime<Utc>>, TraderError>;

    fn snapshot(&self) -> Result<StoreSnapshot, TraderError>;

    /// At most `limit` audit entries, newest first.
    fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, TraderError>;

    /// Appends the trade, replaces the position with the one it implies and
    /// advances the watermark. Refuses a trade that breaks alternation.
    fn commit_trade(
        &self,
        trade: &NewTrade,
        watermark: DateTime<Utc>,
    ) -> Result<TradeRecord, TraderError>;

    /// Appends an audit entry, optionally advancing the watermark with it.
    fn record_audit(
        &self,
        entry: &NewAuditEntry,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<AuditEntry, TraderError>;

    /// Returns the watermark in effect afterwards.
    fn advance_watermark(&self, watermark: DateTime<Utc>) -> Result<DateTime<Utc>, TraderError>;

    /// Overwrites the position row without touching the ledger.
    fn repair_position(
        &self,
        position: &Position,
        entry: &NewAuditEntry,
    ) -> Result<(), TraderError>;

    /// Truncates the ledger, forces the position flat and sets the watermark.
    /// Returns the number of trades removed.
    fn reset(&self, entry: &NewAuditEntry, watermark: DateTime<Utc>) -> Result<usize, TraderError>;
}
