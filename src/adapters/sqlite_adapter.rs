//! SQLite position store.
//!
//! Position, ledger, audit log and watermark share one database file, so a
//! trade and the watermark it consumes land in the same transaction.

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;

use crate::domain::audit::{AuditEntry, AuditKind, NewAuditEntry};
use crate::domain::error::TraderError;
use crate::domain::ledger::{next_action, NewTrade, TradeAction, TradeRecord, TriggerKind};
use crate::domain::position::{Position, PositionStatus};
use crate::domain::schedule::EventKind;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::{PositionStore, StoreSnapshot};

const WATERMARK_KEY: &str = "watermark";
const MAX_POOL_SIZE: u32 = 64;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS position (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        status TEXT NOT NULL CHECK (status IN ('FLAT', 'OPEN')),
        instrument TEXT,
        entry_price REAL,
        entry_time TEXT,
        quantity INTEGER NOT NULL DEFAULT 0,
        CHECK (
            (status = 'FLAT' AND instrument IS NULL AND entry_price IS NULL AND entry_time IS NULL)
            OR (status = 'OPEN' AND instrument IS NOT NULL AND entry_price IS NOT NULL AND entry_time IS NOT NULL)
        )
    );
    CREATE TABLE IF NOT EXISTS trades (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        action TEXT NOT NULL CHECK (action IN ('BUY', 'SELL')),
        instrument TEXT NOT NULL,
        price REAL NOT NULL,
        quantity INTEGER NOT NULL,
        timestamp TEXT NOT NULL,
        trigger_kind TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS audit_log (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        recorded_at TEXT NOT NULL,
        kind TEXT NOT NULL,
        trigger_kind TEXT,
        event TEXT,
        due_at TEXT,
        detail TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    INSERT OR IGNORE INTO position (id, status, quantity) VALUES (1, 'FLAT', 0);";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> TraderError {
    TraderError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> TraderError {
    TraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, TraderError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TraderError::Database {
            reason: format!("invalid timestamp {raw:?}: {e}"),
        })
}

fn parse_label<T>(raw: &str, what: &str, parse: fn(&str) -> Option<T>) -> Result<T, TraderError> {
    parse(raw).ok_or_else(|| TraderError::Database {
        reason: format!("unknown {what} {raw:?}"),
    })
}

struct RawTrade {
    id: i64,
    action: String,
    instrument: String,
    price: f64,
    quantity: i64,
    timestamp: String,
    trigger_kind: String,
}

impl RawTrade {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            action: row.get(1)?,
            instrument: row.get(2)?,
            price: row.get(3)?,
            quantity: row.get(4)?,
            timestamp: row.get(5)?,
            trigger_kind: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<TradeRecord, TraderError> {
        Ok(TradeRecord {
            id: self.id,
            action: parse_label(&self.action, "trade action", TradeAction::parse)?,
            instrument: self.instrument,
            price: self.price,
            quantity: self.quantity,
            timestamp: parse_ts(&self.timestamp)?,
            trigger_kind: parse_label(&self.trigger_kind, "trigger kind", TriggerKind::parse)?,
        })
    }
}

struct RawAudit {
    id: i64,
    recorded_at: String,
    kind: String,
    trigger_kind: Option<String>,
    event: Option<String>,
    due_at: Option<String>,
    detail: String,
}

impl RawAudit {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            recorded_at: row.get(1)?,
            kind: row.get(2)?,
            trigger_kind: row.get(3)?,
            event: row.get(4)?,
            due_at: row.get(5)?,
            detail: row.get(6)?,
        })
    }

    fn into_entry(self) -> Result<AuditEntry, TraderError> {
        Ok(AuditEntry {
            id: self.id,
            recorded_at: parse_ts(&self.recorded_at)?,
            kind: parse_label(&self.kind, "audit kind", AuditKind::parse)?,
            trigger: self
                .trigger_kind
                .as_deref()
                .map(|t| parse_label(t, "trigger kind", TriggerKind::parse))
                .transpose()?,
            event: self
                .event
                .as_deref()
                .map(|e| parse_label(e, "event kind", EventKind::parse))
                .transpose()?,
            due_at: self.due_at.as_deref().map(parse_ts).transpose()?,
            detail: self.detail,
        })
    }
}

fn read_position(conn: &Connection) -> Result<Position, TraderError> {
    let row: (String, Option<String>, Option<f64>, Option<String>, i64) = conn
        .query_row(
            "SELECT status, instrument, entry_price, entry_time, quantity FROM position WHERE id = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .map_err(query_err)?;

    match (parse_label(&row.0, "position status", PositionStatus::parse)?, row) {
        (PositionStatus::Flat, _) => Ok(Position::Flat),
        (PositionStatus::Open, (_, Some(instrument), Some(entry_price), Some(entry_time), quantity)) => {
            Ok(Position::open(instrument, entry_price, parse_ts(&entry_time)?, quantity))
        }
        (PositionStatus::Open, _) => Err(TraderError::integrity(
            "open position row is missing entry details",
        )),
    }
}

fn write_position(conn: &Connection, position: &Position) -> Result<(), TraderError> {
    match position {
        Position::Flat => conn.execute(
            "UPDATE position SET status = 'FLAT', instrument = NULL, entry_price = NULL,
                 entry_time = NULL, quantity = 0 WHERE id = 1",
            [],
        ),
        Position::Open(open) => conn.execute(
            "UPDATE position SET status = 'OPEN', instrument = ?1, entry_price = ?2,
                 entry_time = ?3, quantity = ?4 WHERE id = 1",
            params![
                open.instrument,
                open.entry_price,
                format_ts(&open.entry_time),
                open.quantity
            ],
        ),
    }
    .map_err(query_err)?;
    Ok(())
}

fn read_ledger(conn: &Connection) -> Result<Vec<TradeRecord>, TraderError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, action, instrument, price, quantity, timestamp, trigger_kind
             FROM trades ORDER BY id ASC",
        )
        .map_err(query_err)?;
    let rows = stmt.query_map([], RawTrade::from_row).map_err(query_err)?;

    let mut ledger = Vec::new();
    for row in rows {
        ledger.push(row.map_err(query_err)?.into_record()?);
    }
    Ok(ledger)
}

fn read_watermark(conn: &Connection) -> Result<Option<DateTime<Utc>>, TraderError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            params![WATERMARK_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(query_err)?;
    raw.as_deref().map(parse_ts).transpose()
}

/// Stores the later of the current and given watermark.
fn bump_watermark(conn: &Connection, candidate: DateTime<Utc>) -> Result<DateTime<Utc>, TraderError> {
    let effective = match read_watermark(conn)? {
        Some(current) if current >= candidate => return Ok(current),
        _ => candidate,
    };
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![WATERMARK_KEY, format_ts(&effective)],
    )
    .map_err(query_err)?;
    Ok(effective)
}

fn insert_audit(conn: &Connection, entry: &NewAuditEntry) -> Result<AuditEntry, TraderError> {
    conn.execute(
        "INSERT INTO audit_log (recorded_at, kind, trigger_kind, event, due_at, detail)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            format_ts(&entry.recorded_at),
            entry.kind.as_str(),
            entry.trigger.map(|t| t.as_str()),
            entry.event.map(|e| e.as_str()),
            entry.due_at.as_ref().map(format_ts),
            entry.detail
        ],
    )
    .map_err(query_err)?;
    Ok(entry.clone().with_id(conn.last_insert_rowid()))
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| TraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = match config.get_string("sqlite", "pool_size") {
            None => 4,
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|n| (1..=MAX_POOL_SIZE).contains(n))
                .ok_or_else(|| TraderError::ConfigInvalid {
                    section: "sqlite".into(),
                    key: "pool_size".into(),
                    reason: format!("pool_size must be between 1 and {MAX_POOL_SIZE}, got {raw:?}"),
                })?,
        };
        Self::open(&db_path, pool_size)
    }

    pub fn open<P: AsRef<Path>>(path: P, pool_size: u32) -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                row.get::<_, String>(0)
            })?;
            conn.pragma_update(None, "synchronous", "FULL")?;
            conn.busy_timeout(std::time::Duration::from_secs(5))
        });
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn initialize_schema(&self) -> Result<(), TraderError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, TraderError> {
        self.pool.get().map_err(pool_err)
    }

    /// Runs `f` inside an IMMEDIATE transaction and commits on success.
    fn write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, TraderError>,
    ) -> Result<T, TraderError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(query_err)?;
        let value = f(&tx)?;
        tx.commit().map_err(query_err)?;
        Ok(value)
    }
}

impl PositionStore for SqliteAdapter {
    fn load_position(&self) -> Result<Position, TraderError> {
        let conn = self.conn()?;
        read_position(&conn)
    }

    fn load_ledger(&self) -> Result<Vec<TradeRecord>, TraderError> {
        let conn = self.conn()?;
        read_ledger(&conn)
    }

    fn recent_trades(&self, limit: usize) -> Result<Vec<TradeRecord>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, action, instrument, price, quantity, timestamp, trigger_kind
                 FROM trades ORDER BY id DESC LIMIT ?1",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![limit as i64], RawTrade::from_row)
            .map_err(query_err)?;

        let mut trades = Vec::new();
        for row in rows {
            trades.push(row.map_err(query_err)?.into_record()?);
        }
        Ok(trades)
    }

    fn load_watermark(&self) -> Result<Option<DateTime<Utc>>, TraderError> {
        let conn = self.conn()?;
        read_watermark(&conn)
    }

    fn snapshot(&self) -> Result<StoreSnapshot, TraderError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(query_err)?;
        let snapshot = StoreSnapshot {
            position: read_position(&tx)?,
            ledger: read_ledger(&tx)?,
            watermark: read_watermark(&tx)?,
        };
        tx.commit().map_err(query_err)?;
        Ok(snapshot)
    }

    fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEntry>, TraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, recorded_at, kind, trigger_kind, event, due_at, detail
                 FROM audit_log ORDER BY id DESC LIMIT ?1",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![limit as i64], RawAudit::from_row)
            .map_err(query_err)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(query_err)?.into_entry()?);
        }
        Ok(entries)
    }

    fn commit_trade(
        &self,
        trade: &NewTrade,
        watermark: DateTime<Utc>,
    ) -> Result<TradeRecord, TraderError> {
        self.write(|tx| {
            let last: Option<String> = tx
                .query_row(
                    "SELECT action FROM trades ORDER BY id DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                )
                .optional()
                .map_err(query_err)?;
            let last = last
                .as_deref()
                .map(|a| parse_label(a, "trade action", TradeAction::parse))
                .transpose()?;
            let expected = next_action(last);
            if trade.action != expected {
                return Err(TraderError::integrity(format!(
                    "refusing {} on a ledger that expects {}",
                    trade.action, expected
                )));
            }

            tx.execute(
                "INSERT INTO trades (action, instrument, price, quantity, timestamp, trigger_kind)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    trade.action.as_str(),
                    trade.instrument,
                    trade.price,
                    trade.quantity,
                    format_ts(&trade.timestamp),
                    trade.trigger_kind.as_str()
                ],
            )
            .map_err(query_err)?;
            let id = tx.last_insert_rowid();

            write_position(tx, &trade.resulting_position())?;
            bump_watermark(tx, watermark)?;
            Ok(trade.clone().with_id(id))
        })
    }

    fn record_audit(
        &self,
        entry: &NewAuditEntry,
        watermark: Option<DateTime<Utc>>,
    ) -> Result<AuditEntry, TraderError> {
        self.write(|tx| {
            let stored = insert_audit(tx, entry)?;
            if let Some(w) = watermark {
                bump_watermark(tx, w)?;
            }
            Ok(stored)
        })
    }

    fn advance_watermark(&self, watermark: DateTime<Utc>) -> Result<DateTime<Utc>, TraderError> {
        self.write(|tx| bump_watermark(tx, watermark))
    }

    fn repair_position(
        &self,
        position: &Position,
        entry: &NewAuditEntry,
    ) -> Result<(), TraderError> {
        self.write(|tx| {
            write_position(tx, position)?;
            insert_audit(tx, entry)?;
            Ok(())
        })
    }

    fn reset(&self, entry: &NewAuditEntry, watermark: DateTime<Utc>) -> Result<usize, TraderError> {
        self.write(|tx| {
            let removed = tx.execute("DELETE FROM trades", []).map_err(query_err)?;
            write_position(tx, &Position::Flat)?;
            tx.execute(
                "INSERT INTO meta (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![WATERMARK_KEY, format_ts(&watermark)],
            )
            .map_err(query_err)?;
            insert_audit(tx, entry)?;
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use chrono::TimeZone;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
    }

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 16, h, m, 0).unwrap()
    }

    fn buy(price: f64) -> NewTrade {
        NewTrade {
            action: TradeAction::Buy,
            instrument: "NIFTY 25000 CE".into(),
            price,
            quantity: 75,
            timestamp: at(9, 58),
            trigger_kind: TriggerKind::Scheduled,
        }
    }

    fn sell(price: f64) -> NewTrade {
        NewTrade {
            action: TradeAction::Sell,
            timestamp: at(10, 30),
            ..buy(price)
        }
    }

    #[test]
    fn from_config_missing_path() {
        match SqliteAdapter::from_config(&EmptyConfig) {
            Err(TraderError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn from_config_rejects_bad_pool_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("paper.db");
        for bad in ["four", "0", "1000"] {
            let ini = format!("[sqlite]\npath = {}\npool_size = {bad}\n", path.display());
            let config = FileConfigAdapter::from_string(&ini).unwrap();
            match SqliteAdapter::from_config(&config) {
                Err(TraderError::ConfigInvalid { key, .. }) => assert_eq!(key, "pool_size"),
                Err(other) => panic!("expected ConfigInvalid, got: {other}"),
                Ok(_) => panic!("expected error for pool_size = {bad}"),
            }
        }
    }

    #[test]
    fn pooled_reads_see_committed_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SqliteAdapter::open(dir.path().join("paper.db"), 2).unwrap();
        store.commit_trade(&buy(100.0), at(9, 58)).unwrap();

        assert!(!store.load_position().unwrap().is_flat());
        assert_eq!(store.load_ledger().unwrap().len(), 1);
        assert_eq!(store.load_watermark().unwrap(), Some(at(9, 58)));
    }

    #[test]
    fn fresh_store_is_flat_and_empty() {
        let store = SqliteAdapter::in_memory().unwrap();
        assert_eq!(store.load_position().unwrap(), Position::Flat);
        assert!(store.load_ledger().unwrap().is_empty());
        assert_eq!(store.load_watermark().unwrap(), None);
    }

    #[test]
    fn schema_initialisation_is_idempotent() {
        let store = SqliteAdapter::in_memory().unwrap();
        store.initialize_schema().unwrap();
        store.initialize_schema().unwrap();
        assert_eq!(store.load_position().unwrap(), Position::Flat);
    }

    #[test]
    fn buy_commit_opens_position_and_advances_watermark() {
        let store = SqliteAdapter::in_memory().unwrap();
        let record = store.commit_trade(&buy(100.0), at(9, 58)).unwrap();
        assert_eq!(record.id, 1);

        let position = store.load_position().unwrap();
        let open = position.as_open().unwrap();
        assert_eq!(open.instrument, "NIFTY 25000 CE");
        assert_eq!(open.entry_time, at(9, 58));
        assert_eq!(store.load_watermark().unwrap(), Some(at(9, 58)));
    }

    #[test]
    fn sell_commit_flattens_position() {
        let store = SqliteAdapter::in_memory().unwrap();
        store.commit_trade(&buy(100.0), at(9, 58)).unwrap();
        store.commit_trade(&sell(95.5), at(10, 30)).unwrap();
        assert!(store.load_position().unwrap().is_flat());
        assert_eq!(store.load_ledger().unwrap().len(), 2);
    }

    #[test]
    fn commit_refuses_double_buy() {
        let store = SqliteAdapter::in_memory().unwrap();
        store.commit_trade(&buy(100.0), at(9, 58)).unwrap();
        let result = store.commit_trade(&buy(101.0), at(10, 0));
        assert!(matches!(result, Err(TraderError::Integrity { .. })));
        assert_eq!(store.load_ledger().unwrap().len(), 1);
        assert_eq!(store.load_watermark().unwrap(), Some(at(9, 58)));
    }

    #[test]
    fn commit_refuses_sell_first() {
        let store = SqliteAdapter::in_memory().unwrap();
        assert!(store.commit_trade(&sell(95.5), at(10, 30)).is_err());
        assert!(store.load_ledger().unwrap().is_empty());
    }

    #[test]
    fn watermark_never_moves_backwards() {
        let store = SqliteAdapter::in_memory().unwrap();
        assert_eq!(store.advance_watermark(at(12, 0)).unwrap(), at(12, 0));
        assert_eq!(store.advance_watermark(at(11, 0)).unwrap(), at(12, 0));
        assert_eq!(store.load_watermark().unwrap(), Some(at(12, 0)));
    }

    #[test]
    fn timestamps_round_trip_exactly() {
        let store = SqliteAdapter::in_memory().unwrap();
        let precise = at(9, 58) + chrono::Duration::nanoseconds(123_456_789);
        let trade = NewTrade {
            timestamp: precise,
            ..buy(100.0)
        };
        store.commit_trade(&trade, precise).unwrap();
        assert_eq!(store.load_ledger().unwrap()[0].timestamp, precise);
        assert_eq!(store.load_watermark().unwrap(), Some(precise));
    }

    #[test]
    fn recent_trades_are_newest_first() {
        let store = SqliteAdapter::in_memory().unwrap();
        store.commit_trade(&buy(100.0), at(9, 58)).unwrap();
        store.commit_trade(&sell(95.5), at(10, 30)).unwrap();
        let recent = store.recent_trades(1).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].action, TradeAction::Sell);
    }

    #[test]
    fn audit_entries_round_trip() {
        let store = SqliteAdapter::in_memory().unwrap();
        let entry = NewAuditEntry::new(AuditKind::NoOp, at(9, 0), "nothing to sell")
            .triggered_by(TriggerKind::Scheduled);
        let stored = store.record_audit(&entry, Some(at(9, 0))).unwrap();
        assert_eq!(stored.id, 1);

        let entries = store.recent_audit(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, AuditKind::NoOp);
        assert_eq!(entries[0].trigger, Some(TriggerKind::Scheduled));
        assert_eq!(entries[0].detail, "nothing to sell");
        assert_eq!(store.load_watermark().unwrap(), Some(at(9, 0)));
    }

    #[test]
    fn reset_truncates_ledger_but_keeps_ids_monotonic() {
        let store = SqliteAdapter::in_memory().unwrap();
        store.commit_trade(&buy(100.0), at(9, 58)).unwrap();
        store.commit_trade(&sell(95.5), at(10, 30)).unwrap();
        store.commit_trade(&buy(90.0), at(11, 0)).unwrap();

        let entry = NewAuditEntry::new(AuditKind::Reset, at(12, 0), "reset");
        assert_eq!(store.reset(&entry, at(12, 0)).unwrap(), 3);
        assert!(store.load_position().unwrap().is_flat());
        assert!(store.load_ledger().unwrap().is_empty());

        let record = store.commit_trade(&buy(80.0), at(13, 0)).unwrap();
        assert_eq!(record.id, 4);
    }

    #[test]
    fn repair_overwrites_position_only() {
        let store = SqliteAdapter::in_memory().unwrap();
        store.commit_trade(&buy(100.0), at(9, 58)).unwrap();
        let entry = NewAuditEntry::new(AuditKind::Repaired, at(12, 0), "test");
        store.repair_position(&Position::Flat, &entry).unwrap();
        assert!(store.load_position().unwrap().is_flat());
        assert_eq!(store.load_ledger().unwrap().len(), 1);
    }

    #[test]
    fn snapshot_reads_everything_together() {
        let store = SqliteAdapter::in_memory().unwrap();
        store.commit_trade(&buy(100.0), at(9, 58)).unwrap();
        let snapshot = store.snapshot().unwrap();
        assert_eq!(snapshot.ledger.len(), 1);
        assert!(!snapshot.position.is_flat());
        assert_eq!(snapshot.watermark, Some(at(9, 58)));
    }
}
