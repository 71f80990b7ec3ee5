//! Audit trail for everything that is not a trade: skips, no-ops, retries,
//! abandoned events, repairs, halts and resets.

use chrono::{DateTime, Utc};
use std::fmt;

use super::ledger::TriggerKind;
use super::schedule::DueEvent;
use super::schedule::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    /// Missed event passed over during catch-up.
    Skipped,
    /// Event consumed without side effect.
    NoOp,
    /// A collaborator failed; the event stays due.
    TransientFailure,
    /// Retry budget exhausted; the watermark moved past the event.
    Abandoned,
    /// Position rebuilt from the ledger at startup.
    Repaired,
    Halted,
    Reset,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Skipped => "SKIPPED",
            AuditKind::NoOp => "NOOP",
            AuditKind::TransientFailure => "TRANSIENT_FAILURE",
            AuditKind::Abandoned => "ABANDONED",
            AuditKind::Repaired => "REPAIRED",
            AuditKind::Halted => "HALTED",
            AuditKind::Reset => "RESET",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "SKIPPED" => Some(AuditKind::Skipped),
            "NOOP" => Some(AuditKind::NoOp),
            "TRANSIENT_FAILURE" => Some(AuditKind::TransientFailure),
            "ABANDONED" => Some(AuditKind::Abandoned),
            "REPAIRED" => Some(AuditKind::Repaired),
            "HALTED" => Some(AuditKind::Halted),
            "RESET" => Some(AuditKind::Reset),
            _ => None,
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub recorded_at: DateTime<Utc>,
    pub kind: AuditKind,
    pub trigger: Option<TriggerKind>,
    pub event: Option<EventKind>,
    pub due_at: Option<DateTime<Utc>>,
    pub detail: String,
}

impl NewAuditEntry {
    pub fn new(kind: AuditKind, recorded_at: DateTime<Utc>, detail: impl Into<String>) -> Self {
        Self {
            recorded_at,
            kind,
            trigger: None,
            event: None,
            due_at: None,
            detail: detail.into(),
        }
    }

    pub fn for_event(
        kind: AuditKind,
        event: &DueEvent,
        recorded_at: DateTime<Utc>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            event: Some(event.kind),
            due_at: Some(event.due_at),
            ..Self::new(kind, recorded_at, detail)
        }
    }

    pub fn triggered_by(mut self, trigger: TriggerKind) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_id(self, id: i64) -> AuditEntry {
        AuditEntry {
            id,
            recorded_at: self.recorded_at,
            kind: self.kind,
            trigger: self.trigger,
            event: self.event,
            due_at: self.due_at,
            detail: self.detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub id: i64,
    pub recorded_at: DateTime<Utc>,
    pub kind: AuditKind,
    pub trigger: Option<TriggerKind>,
    pub event: Option<EventKind>,
    pub due_at: Option<DateTime<Utc>>,
    pub detail: String,
}
