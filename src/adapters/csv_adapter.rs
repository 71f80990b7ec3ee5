//! CSV quote book and ledger export.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::Write;
use std::path::PathBuf;

use crate::domain::error::TraderError;
use crate::domain::ledger::TradeRecord;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_port::QuoteProvider;

/// Quotes read from an `instrument,price` file.
///
/// The file is read again on every call so an external process can keep it
/// current while the trader runs.
pub struct CsvQuoteBook {
    path: PathBuf,
}

impl CsvQuoteBook {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let path = config
            .get_string("quotes", "path")
            .ok_or_else(|| TraderError::ConfigMissing {
                section: "quotes".into(),
                key: "path".into(),
            })?;
        Ok(Self::new(PathBuf::from(path)))
    }

    fn lookup(content: &str, instrument: &str) -> Result<Option<f64>, TraderError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        for result in rdr.records() {
            let record =
                result.map_err(|e| TraderError::quotes(format!("CSV parse error: {}", e)))?;
            if record.get(0) != Some(instrument) {
                continue;
            }
            let raw = record
                .get(1)
                .ok_or_else(|| TraderError::quotes(format!("missing price for {}", instrument)))?;
            let price: f64 = raw.parse().map_err(|e| {
                TraderError::quotes(format!("invalid price {:?} for {}: {}", raw, instrument, e))
            })?;
            return Ok(Some(price));
        }
        Ok(None)
    }
}

#[async_trait]
impl QuoteProvider for CsvQuoteBook {
    async fn quote(
        &self,
        instrument: &str,
        _at: DateTime<Utc>,
    ) -> Result<Option<f64>, TraderError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            TraderError::quotes(format!("failed to read {}: {}", self.path.display(), e))
        })?;
        Self::lookup(&content, instrument)
    }
}

/// Writes the ledger, oldest first, with a header row.
pub fn write_ledger_csv<W: Write>(ledger: &[TradeRecord], out: W) -> Result<(), TraderError> {
    let mut wtr = csv::Writer::from_writer(out);
    let csv_err = |e: csv::Error| TraderError::Io(std::io::Error::other(e));

    wtr.write_record([
        "id",
        "action",
        "instrument",
        "price",
        "quantity",
        "timestamp",
        "trigger_kind",
    ])
    .map_err(csv_err)?;
    for record in ledger {
        wtr.write_record([
            record.id.to_string(),
            record.action.as_str().to_string(),
            record.instrument.clone(),
            record.price.to_string(),
            record.quantity.to_string(),
            record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            record.trigger_kind.as_str().to_string(),
        ])
        .map_err(csv_err)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::{TradeAction, TriggerKind};
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn setup_quotes(content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quotes.csv");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn quote_returns_price_for_known_instrument() {
        let (_dir, path) = setup_quotes(
            "instrument,price\nNIFTY 25000 CE,100.0\nNIFTY 25100 CE, 62.5\n",
        );
        let book = CsvQuoteBook::new(path);
        assert_eq!(book.quote("NIFTY 25100 CE", Utc::now()).await.unwrap(), Some(62.5));
    }

    #[tokio::test]
    async fn quote_is_none_for_unknown_instrument() {
        let (_dir, path) = setup_quotes("instrument,price\nNIFTY 25000 CE,100.0\n");
        let book = CsvQuoteBook::new(path);
        assert_eq!(book.quote("BANKNIFTY", Utc::now()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn quote_rereads_file_each_call() {
        let (_dir, path) = setup_quotes("instrument,price\nNIFTY 25000 CE,100.0\n");
        let book = CsvQuoteBook::new(path.clone());
        assert_eq!(book.quote("NIFTY 25000 CE", Utc::now()).await.unwrap(), Some(100.0));

        fs::write(&path, "instrument,price\nNIFTY 25000 CE,95.5\n").unwrap();
        assert_eq!(book.quote("NIFTY 25000 CE", Utc::now()).await.unwrap(), Some(95.5));
    }

    #[tokio::test]
    async fn missing_file_is_transient() {
        let book = CsvQuoteBook::new(PathBuf::from("/nonexistent/quotes.csv"));
        let err = book.quote("NIFTY 25000 CE", Utc::now()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn malformed_price_is_transient() {
        let (_dir, path) = setup_quotes("instrument,price\nNIFTY 25000 CE,abc\n");
        let book = CsvQuoteBook::new(path);
        let err = book.quote("NIFTY 25000 CE", Utc::now()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn ledger_export_has_header_and_rows() {
        let ledger = vec![TradeRecord {
            id: 1,
            action: TradeAction::Buy,
            instrument: "NIFTY 25000 CE".into(),
            price: 100.0,
            quantity: 75,
            timestamp: Utc.with_ymd_and_hms(2025, 9, 16, 9, 58, 0).unwrap(),
            trigger_kind: TriggerKind::Catchup,
        }];
        let mut out = Vec::new();
        write_ledger_csv(&ledger, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,action,instrument,price,quantity,timestamp,trigger_kind")
        );
        assert_eq!(
            lines.next(),
            Some("1,BUY,NIFTY 25000 CE,100,75,2025-09-16T09:58:00Z,CATCHUP")
        );
        assert_eq!(lines.next(), None);
    }
}
