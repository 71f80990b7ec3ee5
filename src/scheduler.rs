//! Tick loop driving the trade engine.
//!
//! Every tick computes the events due between the persisted watermark and
//! now and hands them to the engine as one batch. Events the engine leaves
//! pending are retried with backoff and abandoned once the retry budget is
//! spent.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::engine::TradeEngine;
use crate::domain::error::TraderError;
use crate::domain::ledger::TradeRecord;
use crate::domain::retry::RetryPolicy;
use crate::domain::schedule::DueEvent;
use crate::ports::clock_port::Clock;

#[derive(Debug, Clone, PartialEq)]
struct RetryState {
    event: DueEvent,
    attempts: u32,
    next_attempt_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub trades: Vec<TradeRecord>,
    pub noops: usize,
    pub skipped: usize,
    pub abandoned: usize,
    /// Event waiting for its next retry.
    pub waiting: Option<DueEvent>,
    pub halted: bool,
}

impl TickReport {
    pub fn is_idle(&self) -> bool {
        self.trades.is_empty()
            && self.noops == 0
            && self.skipped == 0
            && self.abandoned == 0
            && self.waiting.is_none()
            && !self.halted
    }
}

pub struct Scheduler {
    engine: Arc<Mutex<TradeEngine>>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    tick_interval: Duration,
    retry_state: Option<RetryState>,
}

impl Scheduler {
    pub fn new(
        engine: Arc<Mutex<TradeEngine>>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        tick_interval: Duration,
    ) -> Self {
        Self {
            engine,
            clock,
            retry,
            tick_interval,
            retry_state: None,
        }
    }

    pub fn engine(&self) -> Arc<Mutex<TradeEngine>> {
        Arc::clone(&self.engine)
    }

    /// Attempts made so far on the event currently being retried.
    pub fn pending_attempts(&self) -> Option<(DueEvent, u32)> {
        self.retry_state.as_ref().map(|s| (s.event, s.attempts))
    }

    /// One pass over everything due up to now.
    pub async fn tick(&mut self) -> Result<TickReport, TraderError> {
        let now = self.clock.now();
        let mut report = TickReport::default();
        let mut engine = self.engine.lock().await;

        if engine.halted_reason().is_some() {
            report.halted = true;
            return Ok(report);
        }

        loop {
            let watermark = engine.watermark(now)?;

            if let Some(state) = &self.retry_state {
                if state.event.due_at <= watermark {
                    // consumed elsewhere, e.g. by a reset
                    self.retry_state = None;
                } else if now < state.next_attempt_at {
                    report.waiting = Some(state.event);
                    return Ok(report);
                }
            }

            let events = engine.schedule().due_events(watermark, now);
            let outcome = match engine.process_batch(&events, now).await {
                Ok(outcome) => outcome,
                Err(TraderError::Halted { .. }) | Err(TraderError::Integrity { .. }) => {
                    self.retry_state = None;
                    report.halted = true;
                    return Ok(report);
                }
                Err(e) => return Err(e),
            };

            report.trades.extend(outcome.trades);
            report.noops += outcome.noops;
            report.skipped += outcome.skipped;

            let Some(pending) = outcome.pending else {
                self.retry_state = None;
                engine.finish_batch(now)?;
                return Ok(report);
            };

            let attempts = match &self.retry_state {
                Some(state) if state.event == pending.event => state.attempts + 1,
                _ => 1,
            };

            if self.retry.exhausted(attempts) {
                engine.abandon(&pending.event, attempts, &pending.reason, now)?;
                self.retry_state = None;
                report.abandoned += 1;
                continue;
            }

            let backoff = self.retry.backoff(attempts);
            let next_attempt_at = now
                + chrono::Duration::from_std(backoff)
                    .unwrap_or_else(|_| chrono::Duration::seconds(60));
            warn!(
                event = %pending.event.kind,
                due_at = %pending.event.due_at,
                attempts,
                retry_in_secs = backoff.as_secs(),
                "event will be retried"
            );
            self.retry_state = Some(RetryState {
                event: pending.event,
                attempts,
                next_attempt_at,
            });
            report.waiting = Some(pending.event);
            return Ok(report);
        }
    }

    /// Ticks until `shutdown` resolves.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            tick_secs = self.tick_interval.as_secs(),
            "scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(report) if report.halted => {
                            debug!("engine halted, waiting for reset");
                        }
                        Ok(report) if !report.is_idle() => {
                            info!(
                                trades = report.trades.len(),
                                noops = report.noops,
                                skipped = report.skipped,
                                abandoned = report.abandoned,
                                waiting = report.waiting.is_some(),
                                "tick processed"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "tick failed"),
                    }
                }
                _ = &mut shutdown => {
                    info!("scheduler stopping");
                    break;
                }
            }
        }
    }
}
