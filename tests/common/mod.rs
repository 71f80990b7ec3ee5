#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Asia::Kolkata;
use overnight::adapters::sqlite_adapter::SqliteAdapter;
use overnight::domain::engine::{EngineSettings, TradeEngine};
use overnight::domain::error::TraderError;
use overnight::domain::schedule::Schedule;
use overnight::ports::clock_port::Clock;
use overnight::ports::market_port::{InstrumentSelector, QuoteProvider};
use overnight::ports::store_port::PositionStore;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const INSTRUMENT: &str = "NIFTY 25000 CE";

/// How a scripted collaborator answers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reply {
    Normal,
    Unavailable,
    Fail,
    Hang,
}

pub struct ScriptedSelector {
    instrument: Mutex<Option<String>>,
    replies: Mutex<Vec<Reply>>,
    calls: AtomicU32,
}

impl ScriptedSelector {
    pub fn new(instrument: &str) -> Self {
        Self {
            instrument: Mutex::new(Some(instrument.to_string())),
            replies: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn none_available() -> Self {
        let selector = Self::new(INSTRUMENT);
        *selector.instrument.lock().unwrap() = None;
        selector
    }

    /// Queues replies consumed one per call before falling back to normal.
    pub fn script(&self, replies: &[Reply]) {
        self.replies.lock().unwrap().extend(replies.iter().rev());
    }

    pub fn set_instrument(&self, instrument: &str) {
        *self.instrument.lock().unwrap() = Some(instrument.to_string());
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstrumentSelector for ScriptedSelector {
    async fn select(&self, _at: DateTime<Utc>) -> Result<Option<String>, TraderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.replies.lock().unwrap().pop().unwrap_or(Reply::Normal);
        match reply {
            Reply::Normal => Ok(self.instrument.lock().unwrap().clone()),
            Reply::Unavailable => Ok(None),
            Reply::Fail => Err(TraderError::selector("scripted failure")),
            Reply::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(None)
            }
        }
    }
}

pub struct ScriptedQuotes {
    prices: Mutex<HashMap<String, f64>>,
    replies: Mutex<Vec<Reply>>,
    always: Mutex<Reply>,
    calls: AtomicU32,
}

impl ScriptedQuotes {
    pub fn new() -> Self {
        Self {
            prices: Mutex::new(HashMap::new()),
            replies: Mutex::new(Vec::new()),
            always: Mutex::new(Reply::Normal),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_price(self, instrument: &str, price: f64) -> Self {
        self.set_price(instrument, price);
        self
    }

    pub fn set_price(&self, instrument: &str, price: f64) {
        self.prices
            .lock()
            .unwrap()
            .insert(instrument.to_string(), price);
    }

    pub fn script(&self, replies: &[Reply]) {
        self.replies.lock().unwrap().extend(replies.iter().rev());
    }

    /// Reply used once the script runs out.
    pub fn set_always(&self, reply: Reply) {
        *self.always.lock().unwrap() = reply;
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteProvider for ScriptedQuotes {
    async fn quote(
        &self,
        instrument: &str,
        _at: DateTime<Utc>,
    ) -> Result<Option<f64>, TraderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.replies.lock().unwrap().pop();
        let reply = scripted.unwrap_or(*self.always.lock().unwrap());
        match reply {
            Reply::Normal => Ok(self.prices.lock().unwrap().get(instrument).copied()),
            Reply::Unavailable => Ok(None),
            Reply::Fail => Err(TraderError::quotes("scripted failure")),
            Reply::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(None)
            }
        }
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Wall-clock time in India, as UTC.
pub fn ist(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
    Kolkata
        .with_ymd_and_hms(y, m, d, h, min, s)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn nse_schedule() -> Schedule {
    Schedule::new(
        NaiveTime::from_hms_opt(15, 28, 0).unwrap(),
        NaiveTime::from_hms_opt(9, 21, 0).unwrap(),
        Kolkata,
    )
}

pub fn fast_settings() -> EngineSettings {
    EngineSettings {
        collaborator_timeout: std::time::Duration::from_millis(200),
        ..EngineSettings::default()
    }
}

pub struct Harness {
    pub store: Arc<SqliteAdapter>,
    pub selector: Arc<ScriptedSelector>,
    pub quotes: Arc<ScriptedQuotes>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(SqliteAdapter::in_memory().unwrap())
    }

    pub fn with_store(store: SqliteAdapter) -> Self {
        Self {
            store: Arc::new(store),
            selector: Arc::new(ScriptedSelector::new(INSTRUMENT)),
            quotes: Arc::new(ScriptedQuotes::new().with_price(INSTRUMENT, 100.0)),
        }
    }

    pub fn store(&self) -> Arc<dyn PositionStore> {
        self.store.clone()
    }

    pub fn engine(&self, settings: EngineSettings) -> TradeEngine {
        TradeEngine::new(
            self.store(),
            self.selector.clone(),
            self.quotes.clone(),
            nse_schedule(),
            settings,
        )
    }
}
