//! The single current paper position.

use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionStatus {
    Flat,
    Open,
}

impl PositionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionStatus::Flat => "FLAT",
            PositionStatus::Open => "OPEN",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "FLAT" => Some(PositionStatus::Flat),
            "OPEN" => Some(PositionStatus::Open),
            _ => None,
        }
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Details present only while a position is open.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub instrument: String,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub quantity: i64,
}

impl OpenPosition {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    pub fn cost(&self) -> f64 {
        self.market_value(self.entry_price)
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.quantity as f64 * (price - self.entry_price)
    }
}

/// Either flat or holding exactly one open position.
///
/// Instrument, entry price and entry time exist iff the position is open, so
/// the enum makes the half-filled row unrepresentable.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Position {
    #[default]
    Flat,
    Open(OpenPosition),
}

impl Position {
    pub fn open(
        instrument: impl Into<String>,
        entry_price: f64,
        entry_time: DateTime<Utc>,
        quantity: i64,
    ) -> Self {
        Position::Open(OpenPosition {
            instrument: instrument.into(),
            entry_price,
            entry_time,
            quantity,
        })
    }

    pub fn status(&self) -> PositionStatus {
        match self {
            Position::Flat => PositionStatus::Flat,
            Position::Open(_) => PositionStatus::Open,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Position::Flat)
    }

    pub fn as_open(&self) -> Option<&OpenPosition> {
        match self {
            Position::Flat => None,
            Position::Open(open) => Some(open),
        }
    }

    pub fn quantity(&self) -> i64 {
        self.as_open().map(|o| o.quantity).unwrap_or(0)
    }
}
