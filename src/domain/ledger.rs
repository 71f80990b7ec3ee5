//! Append-only trade ledger and its alternation invariant.

use chrono::{DateTime, Utc};
use std::fmt;

use super::error::TraderError;
use super::position::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BUY" => Some(TradeAction::Buy),
            "SELL" => Some(TradeAction::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What caused a ledger or audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Acted on within the misfire grace of its due time.
    Scheduled,
    /// Acted on (or skipped) while catching up after downtime.
    Catchup,
    ManualReset,
}

impl TriggerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Scheduled => "SCHEDULED",
            TriggerKind::Catchup => "CATCHUP",
            TriggerKind::ManualReset => "MANUAL_RESET",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SCHEDULED" => Some(TriggerKind::Scheduled),
            "CATCHUP" => Some(TriggerKind::Catchup),
            "MANUAL_RESET" => Some(TriggerKind::ManualReset),
            _ => None,
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trade about to be committed; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub action: TradeAction,
    pub instrument: String,
    pub price: f64,
    pub quantity: i64,
    pub timestamp: DateTime<Utc>,
    pub trigger_kind: TriggerKind,
}

impl NewTrade {
    /// The position this trade leaves behind.
    pub fn resulting_position(&self) -> Position {
        match self.action {
            TradeAction::Buy => Position::open(
                self.instrument.clone(),
                self.price,
                self.timestamp,
                self.quantity,
            ),
            TradeAction::Sell => Position::Flat,
        }
    }

    pub fn with_id(self, id: i64) -> TradeRecord {
        TradeRecord {
            id,
            action: self.action,
            instrument: self.instrument,
            price: self.price,
            quantity: self.quantity,
            timestamp: self.timestamp,
            trigger_kind: self.trigger_kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub id: i64,
    pub action: TradeAction,
    pub instrument: String,
    pub price: f64,
    pub quantity: i64,
    pub timestamp: DateTime<Utc>,
    pub trigger_kind: TriggerKind,
}

/// The action that may legally follow `last`.
pub fn next_action(last: Option<TradeAction>) -> TradeAction {
    match last {
        None | Some(TradeAction::Sell) => TradeAction::Buy,
        Some(TradeAction::Buy) => TradeAction::Sell,
    }
}

/// Checks that `records` (ordered by id) alternate BUY, SELL, BUY, ...
/// starting with BUY, and that each SELL closes the instrument just bought.
pub fn validate_alternation(records: &[TradeRecord]) -> Result<(), TraderError> {
    let mut last: Option<&TradeRecord> = None;
    for record in records {
        let expected = next_action(last.map(|r| r.action));
        if record.action != expected {
            return Err(TraderError::integrity(format!(
                "ledger entry #{} is {} but {} was expected",
                record.id, record.action, expected
            )));
        }
        if let Some(prev) = last {
            if record.id <= prev.id {
                return Err(TraderError::integrity(format!(
                    "ledger ids not increasing: #{} follows #{}",
                    record.id, prev.id
                )));
            }
            if record.action == TradeAction::Sell && record.instrument != prev.instrument {
                return Err(TraderError::integrity(format!(
                    "ledger entry #{} sells {} but #{} bought {}",
                    record.id, record.instrument, prev.id, prev.instrument
                )));
            }
        }
        last = Some(record);
    }
    Ok(())
}

/// The position a valid ledger implies: open on the last BUY if the ledger
/// ends in one, flat otherwise.
pub fn implied_position(records: &[TradeRecord]) -> Position {
    match records.last() {
        Some(last) if last.action == TradeAction::Buy => {
            Position::open(last.instrument.clone(), last.price, last.timestamp, last.quantity)
        }
        _ => Position::Flat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: i64, action: TradeAction, instrument: &str, price: f64) -> TradeRecord {
        TradeRecord {
            id,
            action,
            instrument: instrument.into(),
            price,
            quantity: 75,
            timestamp: Utc.with_ymd_and_hms(2025, 9, 16, 9, 58, 0).unwrap()
                + chrono::Duration::days(id),
            trigger_kind: TriggerKind::Scheduled,
        }
    }

    #[test]
    fn empty_ledger_is_valid_and_flat() {
        assert!(validate_alternation(&[]).is_ok());
        assert_eq!(implied_position(&[]), Position::Flat);
    }

    #[test]
    fn alternating_ledger_is_valid() {
        let ledger = vec![
            record(1, TradeAction::Buy, "X", 100.0),
            record(2, TradeAction::Sell, "X", 95.5),
            record(3, TradeAction::Buy, "Y", 80.0),
        ];
        assert!(validate_alternation(&ledger).is_ok());
        let pos = implied_position(&ledger);
        let open = pos.as_open().unwrap();
        assert_eq!(open.instrument, "Y");
        assert!((open.entry_price - 80.0).abs() < f64::EPSILON);
    }

    #[test]
    fn ledger_starting_with_sell_is_rejected() {
        let ledger = vec![record(1, TradeAction::Sell, "X", 100.0)];
        match validate_alternation(&ledger) {
            Err(TraderError::Integrity { reason }) => assert!(reason.contains("#1")),
            other => panic!("expected integrity error, got {other:?}"),
        }
    }

    #[test]
    fn double_buy_is_rejected() {
        let ledger = vec![
            record(1, TradeAction::Buy, "X", 100.0),
            record(2, TradeAction::Buy, "X", 101.0),
        ];
        assert!(matches!(
            validate_alternation(&ledger),
            Err(TraderError::Integrity { .. })
        ));
    }

    #[test]
    fn selling_a_different_instrument_is_rejected() {
        let ledger = vec![
            record(1, TradeAction::Buy, "X", 100.0),
            record(2, TradeAction::Sell, "Y", 101.0),
        ];
        assert!(validate_alternation(&ledger).is_err());
    }

    #[test]
    fn ledger_ending_in_sell_is_flat() {
        let ledger = vec![
            record(1, TradeAction::Buy, "X", 100.0),
            record(2, TradeAction::Sell, "X", 95.5),
        ];
        assert!(implied_position(&ledger).is_flat());
    }

    #[test]
    fn next_action_alternates() {
        assert_eq!(next_action(None), TradeAction::Buy);
        assert_eq!(next_action(Some(TradeAction::Buy)), TradeAction::Sell);
        assert_eq!(next_action(Some(TradeAction::Sell)), TradeAction::Buy);
    }

    #[test]
    fn buy_leaves_an_open_position() {
        let trade = NewTrade {
            action: TradeAction::Buy,
            instrument: "X".into(),
            price: 100.0,
            quantity: 75,
            timestamp: Utc.with_ymd_and_hms(2025, 9, 16, 9, 58, 0).unwrap(),
            trigger_kind: TriggerKind::Scheduled,
        };
        let pos = trade.resulting_position();
        assert_eq!(pos.as_open().unwrap().instrument, "X");
        let sell = NewTrade {
            action: TradeAction::Sell,
            ..trade
        };
        assert!(sell.resulting_position().is_flat());
    }
}
