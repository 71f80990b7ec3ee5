//! The trade state machine.
//!
//! | state | event        | effect                                   |
//! |-------|--------------|------------------------------------------|
//! | FLAT  | BUY_WINDOW   | select + quote, commit BUY, now OPEN     |
//! | OPEN  | SELL_WINDOW  | quote held instrument, commit SELL, FLAT |
//! | FLAT  | SELL_WINDOW  | consumed, nothing to sell                |
//! | OPEN  | BUY_WINDOW   | consumed, never stack                    |
//!
//! Each trade is committed together with the watermark in one store
//! transaction. A collaborator failure leaves the event unconsumed.

use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::audit::{AuditKind, NewAuditEntry};
use super::error::TraderError;
use super::ledger::{NewTrade, TradeAction, TradeRecord, TriggerKind};
use super::position::{OpenPosition, Position};
use super::recovery::{self, RecoveryReport};
use super::reset::{self, ResetReport};
use super::schedule::{DueEvent, EventKind, Schedule};
use crate::ports::market_port::{InstrumentSelector, QuoteProvider};
use crate::ports::store_port::PositionStore;

/// How a batch holding missed events is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatchUpPolicy {
    /// Act once, on the most recent event valid from the current state; skip
    /// every other event of the batch.
    LatestValid,
    /// Skip every event later than the misfire grace; act on the rest in order.
    SkipStale,
}

impl CatchUpPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatchUpPolicy::LatestValid => "latest",
            CatchUpPolicy::SkipStale => "skip",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "latest" => Some(CatchUpPolicy::LatestValid),
            "skip" => Some(CatchUpPolicy::SkipStale),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub catch_up: CatchUpPolicy,
    /// Lateness still recorded as SCHEDULED rather than CATCHUP.
    pub misfire_grace: Duration,
    pub quantity: i64,
    pub collaborator_timeout: std::time::Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            catch_up: CatchUpPolicy::LatestValid,
            misfire_grace: Duration::seconds(120),
            quantity: 75,
            collaborator_timeout: std::time::Duration::from_secs(10),
        }
    }
}

/// An event left due because a collaborator failed.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub event: DueEvent,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    pub trades: Vec<TradeRecord>,
    pub noops: usize,
    pub skipped: usize,
    /// Set when processing stopped at an unconsumed event.
    pub pending: Option<PendingEvent>,
}

enum Step {
    Act(TriggerKind),
    Skip(&'static str),
}

enum Applied {
    Traded(TradeRecord),
    NoOp,
    Pending(String),
}

pub struct TradeEngine {
    store: Arc<dyn PositionStore>,
    selector: Arc<dyn InstrumentSelector>,
    quotes: Arc<dyn QuoteProvider>,
    schedule: Schedule,
    settings: EngineSettings,
    halted: Option<String>,
    /// Event whose last attempt failed; retries of it are never stale.
    in_flight: Option<DueEvent>,
}

impl TradeEngine {
    pub fn new(
        store: Arc<dyn PositionStore>,
        selector: Arc<dyn InstrumentSelector>,
        quotes: Arc<dyn QuoteProvider>,
        schedule: Schedule,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            selector,
            quotes,
            schedule,
            settings,
            halted: None,
            in_flight: None,
        }
    }

    pub fn store(&self) -> Arc<dyn PositionStore> {
        Arc::clone(&self.store)
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn halted_reason(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// Startup reconciliation. An integrity failure halts the engine instead
    /// of propagating, so inspection stays available.
    pub fn recover(&mut self, process_start: DateTime<Utc>) -> Result<RecoveryReport, TraderError> {
        match recovery::reconcile(self.store.as_ref(), process_start) {
            Ok(report) => Ok(report),
            Err(TraderError::Integrity { reason }) => {
                self.halt(&reason, process_start);
                Err(TraderError::Integrity { reason })
            }
            Err(e) => Err(e),
        }
    }

    /// Persisted watermark, initialised to `now` when none is stored yet.
    pub fn watermark(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, TraderError> {
        match self.store.load_watermark()? {
            Some(w) => Ok(w),
            None => self.store.advance_watermark(now),
        }
    }

    /// Applies a chronologically ordered batch of due events.
    ///
    /// Stops at the first event a collaborator could not serve and reports
    /// it as pending; everything before it is durably consumed.
    pub async fn process_batch(
        &mut self,
        events: &[DueEvent],
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, TraderError> {
        if let Some(reason) = &self.halted {
            return Err(TraderError::Halted {
                reason: reason.clone(),
            });
        }

        let result = self.run_batch(events, now).await;
        if let Err(TraderError::Integrity { reason }) = &result {
            self.halt(reason, now);
        }
        result
    }

    async fn run_batch(
        &mut self,
        events: &[DueEvent],
        now: DateTime<Utc>,
    ) -> Result<BatchOutcome, TraderError> {
        let mut outcome = BatchOutcome::default();
        if events.is_empty() {
            return Ok(outcome);
        }

        let plan = self.plan(events, now)?;
        if events.len() > 1 {
            info!(
                events = events.len(),
                policy = self.settings.catch_up.as_str(),
                "catching up on missed events"
            );
        }

        for (event, step) in events.iter().zip(plan) {
            match step {
                Step::Skip(reason) => {
                    self.store.record_audit(
                        &NewAuditEntry::for_event(AuditKind::Skipped, event, now, reason)
                            .triggered_by(TriggerKind::Catchup),
                        Some(event.due_at),
                    )?;
                    info!(event = %event.kind, due_at = %event.due_at, reason, "skipped missed event");
                    outcome.skipped += 1;
                }
                Step::Act(trigger) => match self.apply(event, trigger, now).await? {
                    Applied::Traded(record) => outcome.trades.push(record),
                    Applied::NoOp => outcome.noops += 1,
                    Applied::Pending(reason) => {
                        outcome.pending = Some(PendingEvent {
                            event: *event,
                            reason,
                        });
                        return Ok(outcome);
                    }
                },
            }
        }

        Ok(outcome)
    }

    fn lateness(&self, event: &DueEvent, now: DateTime<Utc>) -> Duration {
        now - event.due_at
    }

    fn is_retry(&self, event: &DueEvent) -> bool {
        self.in_flight.as_ref() == Some(event)
    }

    fn trigger_for(&self, event: &DueEvent, now: DateTime<Utc>) -> TriggerKind {
        if self.is_retry(event) || self.lateness(event, now) <= self.settings.misfire_grace {
            TriggerKind::Scheduled
        } else {
            TriggerKind::Catchup
        }
    }

    fn plan(&self, events: &[DueEvent], now: DateTime<Utc>) -> Result<Vec<Step>, TraderError> {
        match self.settings.catch_up {
            CatchUpPolicy::SkipStale => Ok(events
                .iter()
                .map(|e| {
                    if self.trigger_for(e, now) == TriggerKind::Scheduled {
                        Step::Act(TriggerKind::Scheduled)
                    } else {
                        Step::Skip("later than the misfire grace")
                    }
                })
                .collect()),
            CatchUpPolicy::LatestValid => {
                if events.len() == 1 {
                    return Ok(vec![Step::Act(self.trigger_for(&events[0], now))]);
                }
                let position = self.store.load_position()?;
                let chosen = events
                    .iter()
                    .rposition(|e| self.acts_on(&position, e));
                Ok(events
                    .iter()
                    .enumerate()
                    .map(|(i, e)| match chosen {
                        Some(c) if c == i => Step::Act(self.trigger_for(e, now)),
                        Some(c) if i < c => Step::Skip("superseded by a later window"),
                        Some(_) => Step::Skip("only one transition per catch-up"),
                        None => Step::Skip("no transition valid from current state"),
                    })
                    .collect())
            }
        }
    }

    /// Whether `event` would cause a trade from `position`.
    fn acts_on(&self, position: &Position, event: &DueEvent) -> bool {
        match (event.kind, position) {
            (EventKind::BuyWindow, Position::Flat) => true,
            (EventKind::SellWindow, Position::Open(open)) => self.sell_due(open, event),
            _ => false,
        }
    }

    /// A position closes on the first sell window of the next trading day
    /// after its entry, never earlier.
    fn sell_due(&self, open: &OpenPosition, event: &DueEvent) -> bool {
        self.schedule
            .window_for_entry(open.entry_time)
            .map(|w| event.due_at >= w.sell_due_at)
            .unwrap_or(true)
    }

    async fn apply(
        &mut self,
        event: &DueEvent,
        trigger: TriggerKind,
        now: DateTime<Utc>,
    ) -> Result<Applied, TraderError> {
        let position = self.store.load_position()?;
        match (event.kind, position) {
            (EventKind::BuyWindow, Position::Flat) => self.buy(event, trigger, now).await,
            (EventKind::SellWindow, Position::Open(open)) => {
                if self.sell_due(&open, event) {
                    self.sell(event, &open, trigger, now).await
                } else {
                    self.no_op(event, "position is not due to close yet", now)
                }
            }
            (EventKind::BuyWindow, Position::Open(_)) => {
                self.no_op(event, "already holding a position", now)
            }
            (EventKind::SellWindow, Position::Flat) => self.no_op(event, "nothing to sell", now),
        }
    }

    fn no_op(
        &mut self,
        event: &DueEvent,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Applied, TraderError> {
        self.store.record_audit(
            &NewAuditEntry::for_event(AuditKind::NoOp, event, now, reason),
            Some(event.due_at),
        )?;
        self.in_flight = None;
        debug!(event = %event.kind, due_at = %event.due_at, reason, "event consumed without trade");
        Ok(Applied::NoOp)
    }

    async fn buy(
        &mut self,
        event: &DueEvent,
        trigger: TriggerKind,
        now: DateTime<Utc>,
    ) -> Result<Applied, TraderError> {
        let selected = self
            .bounded("instrument selector", self.selector.select(now))
            .await
            .and_then(|s| s.ok_or_else(|| TraderError::selector("no instrument available")));
        let instrument = match selected {
            Ok(instrument) => instrument,
            Err(e) => return self.transient(event, e, now),
        };

        let price = match self.price_of(&instrument, now).await {
            Ok(price) => price,
            Err(e) => return self.transient(event, e, now),
        };

        self.commit(
            event,
            NewTrade {
                action: TradeAction::Buy,
                instrument,
                price,
                quantity: self.settings.quantity,
                timestamp: now,
                trigger_kind: trigger,
            },
        )
    }

    async fn sell(
        &mut self,
        event: &DueEvent,
        open: &OpenPosition,
        trigger: TriggerKind,
        now: DateTime<Utc>,
    ) -> Result<Applied, TraderError> {
        let price = match self.price_of(&open.instrument, now).await {
            Ok(price) => price,
            Err(e) => return self.transient(event, e, now),
        };

        self.commit(
            event,
            NewTrade {
                action: TradeAction::Sell,
                instrument: open.instrument.clone(),
                price,
                quantity: open.quantity,
                timestamp: now,
                trigger_kind: trigger,
            },
        )
    }

    fn commit(&mut self, event: &DueEvent, trade: NewTrade) -> Result<Applied, TraderError> {
        let record = self.store.commit_trade(&trade, event.due_at)?;
        self.in_flight = None;
        info!(
            id = record.id,
            action = %record.action,
            instrument = %record.instrument,
            price = record.price,
            quantity = record.quantity,
            trigger = %record.trigger_kind,
            due_at = %event.due_at,
            "paper trade committed"
        );
        Ok(Applied::Traded(record))
    }

    async fn price_of(&self, instrument: &str, now: DateTime<Utc>) -> Result<f64, TraderError> {
        let quoted = self
            .bounded("quote provider", self.quotes.quote(instrument, now))
            .await?
            .ok_or_else(|| TraderError::quotes(format!("no price for {instrument}")))?;
        if quoted.is_finite() && quoted > 0.0 {
            Ok(quoted)
        } else {
            Err(TraderError::quotes(format!(
                "unusable price {quoted} for {instrument}"
            )))
        }
    }

    async fn bounded<T, F>(&self, collaborator: &'static str, call: F) -> Result<T, TraderError>
    where
        F: Future<Output = Result<T, TraderError>>,
    {
        let limit = self.settings.collaborator_timeout;
        match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(TraderError::Collaborator {
                collaborator,
                reason: format!("timed out after {}ms", limit.as_millis()),
            }),
        }
    }

    fn transient(
        &mut self,
        event: &DueEvent,
        err: TraderError,
        now: DateTime<Utc>,
    ) -> Result<Applied, TraderError> {
        if !err.is_transient() {
            return Err(err);
        }
        let reason = err.to_string();
        warn!(event = %event.kind, due_at = %event.due_at, error = %reason, "event left due");
        self.store.record_audit(
            &NewAuditEntry::for_event(AuditKind::TransientFailure, event, now, reason.clone()),
            None,
        )?;
        self.in_flight = Some(*event);
        Ok(Applied::Pending(reason))
    }

    /// Gives up on an event whose retry budget is spent and moves the
    /// watermark past it.
    pub fn abandon(
        &mut self,
        event: &DueEvent,
        attempts: u32,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TraderError> {
        error!(event = %event.kind, due_at = %event.due_at, attempts, reason, "abandoning event");
        self.store.record_audit(
            &NewAuditEntry::for_event(
                AuditKind::Abandoned,
                event,
                now,
                format!("gave up after {attempts} attempts: {reason}"),
            ),
            Some(event.due_at),
        )?;
        self.in_flight = None;
        Ok(())
    }

    /// Marks every event up to `now` as processed.
    pub fn finish_batch(&mut self, now: DateTime<Utc>) -> Result<DateTime<Utc>, TraderError> {
        self.store.advance_watermark(now)
    }

    /// Administrative wipe; the only way to clear a halt.
    pub fn reset(
        &mut self,
        confirmation: &str,
        now: DateTime<Utc>,
    ) -> Result<ResetReport, TraderError> {
        let report = reset::reset_paper_account(self.store.as_ref(), confirmation, now)?;
        if let Some(reason) = self.halted.take() {
            info!(previous = %reason, "halt cleared by reset");
        }
        self.in_flight = None;
        Ok(report)
    }

    fn halt(&mut self, reason: &str, now: DateTime<Utc>) {
        error!(reason, "integrity violation, trading halted until reset");
        if let Err(e) = self.store.record_audit(
            &NewAuditEntry::new(AuditKind::Halted, now, reason.to_string()),
            None,
        ) {
            error!(error = %e, "failed to record halt");
        }
        self.halted = Some(reason.to_string());
    }
}
