//! Paper account derived from the ledger: round trips, cash and equity curve.
//!
//! Nothing here is stored. Replaying the ledger is the only source, so the
//! account can never drift from the trades.

use chrono::{DateTime, Utc};

use super::ledger::{TradeAction, TradeRecord};
use super::position::{OpenPosition, Position};

/// A BUY joined with the SELL that closed it.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrip {
    pub buy_id: i64,
    pub sell_id: i64,
    pub instrument: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub pnl: f64,
}

impl RoundTrip {
    pub fn entry_value(&self) -> f64 {
        self.quantity as f64 * self.entry_price
    }

    pub fn exit_value(&self) -> f64 {
        self.quantity as f64 * self.exit_price
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountSummary {
    pub starting_cash: f64,
    /// Starting cash plus realized P&L minus the cost of any open position.
    pub cash: f64,
    pub realized_pnl: f64,
    pub open: Option<OpenPosition>,
    pub round_trips: Vec<RoundTrip>,
    pub equity_curve: Vec<EquityPoint>,
}

impl AccountSummary {
    pub fn open_cost(&self) -> f64 {
        self.open.as_ref().map(|o| o.cost()).unwrap_or(0.0)
    }

    /// Equity with the open position valued at cost.
    pub fn book_equity(&self) -> f64 {
        self.cash + self.open_cost()
    }

    pub fn win_count(&self) -> usize {
        self.round_trips.iter().filter(|t| t.pnl > 0.0).count()
    }
}

/// Pairs each SELL with the BUY before it. Expects a validated ledger.
pub fn round_trips(ledger: &[TradeRecord]) -> Vec<RoundTrip> {
    ledger
        .windows(2)
        .filter(|w| w[0].action == TradeAction::Buy && w[1].action == TradeAction::Sell)
        .map(|w| {
            let (buy, sell) = (&w[0], &w[1]);
            RoundTrip {
                buy_id: buy.id,
                sell_id: sell.id,
                instrument: buy.instrument.clone(),
                quantity: buy.quantity,
                entry_price: buy.price,
                exit_price: sell.price,
                entry_time: buy.timestamp,
                exit_time: sell.timestamp,
                pnl: buy.quantity as f64 * (sell.price - buy.price),
            }
        })
        .collect()
}

pub fn summarize(ledger: &[TradeRecord], position: &Position, starting_cash: f64) -> AccountSummary {
    let trips = round_trips(ledger);

    let mut equity = starting_cash;
    let mut curve = Vec::with_capacity(trips.len() + 1);
    if let Some(first) = ledger.first() {
        curve.push(EquityPoint {
            time: first.timestamp,
            equity,
        });
    }
    for trip in &trips {
        equity += trip.pnl;
        curve.push(EquityPoint {
            time: trip.exit_time,
            equity,
        });
    }

    let realized_pnl = equity - starting_cash;
    let open = position.as_open().cloned();
    let open_cost = open.as_ref().map(|o| o.cost()).unwrap_or(0.0);

    AccountSummary {
        starting_cash,
        cash: starting_cash + realized_pnl - open_cost,
        realized_pnl,
        open,
        round_trips: trips,
        equity_curve: curve,
    }
}
