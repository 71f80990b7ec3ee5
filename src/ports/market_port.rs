//! Market collaborator ports: instrument selection and quotes.
//!
//! Both are read-only. `Ok(None)` means the collaborator answered but had
//! nothing to offer (NONE_AVAILABLE / UNAVAILABLE); the engine treats that,
//! an `Err`, and a timeout alike as a transient failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::error::TraderError;

#[async_trait]
pub trait InstrumentSelector: Send + Sync {
    /// Instrument to buy for the window firing at `at`.
    async fn select(&self, at: DateTime<Utc>) -> Result<Option<String>, TraderError>;
}

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    /// Current price of `instrument`.
    async fn quote(&self, instrument: &str, at: DateTime<Utc>)
        -> Result<Option<f64>, TraderError>;
}
