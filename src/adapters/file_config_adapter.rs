//! INI file configuration adapter.

use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TraderError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| TraderError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, TraderError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| TraderError::ConfigParse {
                file: "<inline>".into(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[schedule]
buy_time = 15:28
timezone = Asia/Kolkata

[sqlite]
path = /var/lib/overnight/paper.db
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("schedule", "buy_time"),
            Some("15:28".to_string())
        );
        assert_eq!(
            adapter.get_string("sqlite", "path"),
            Some("/var/lib/overnight/paper.db".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[paper]\nquantity = 75\n").unwrap();
        assert_eq!(adapter.get_string("paper", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[retry]\nmax_attempts = 7\nbad = abc\n").unwrap();
        assert_eq!(adapter.get_int("retry", "max_attempts", 0), 7);
        assert_eq!(adapter.get_int("retry", "missing", 42), 42);
        assert_eq!(adapter.get_int("retry", "bad", 42), 42);
    }

    #[test]
    fn get_double_returns_value_or_default() {
        let adapter =
            FileConfigAdapter::from_string("[paper]\nstarting_cash = 500000.5\nbad = nan?\n")
                .unwrap();
        assert_eq!(adapter.get_double("paper", "starting_cash", 0.0), 500000.5);
        assert_eq!(adapter.get_double("paper", "missing", 99.9), 99.9);
        assert_eq!(adapter.get_double("paper", "bad", 99.9), 99.9);
    }

    #[test]
    fn get_bool_accepts_common_spellings() {
        let adapter = FileConfigAdapter::from_string(
            "[paper]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\n",
        )
        .unwrap();
        assert!(adapter.get_bool("paper", "a", false));
        assert!(adapter.get_bool("paper", "b", false));
        assert!(adapter.get_bool("paper", "c", false));
        assert!(!adapter.get_bool("paper", "d", true));
        assert!(!adapter.get_bool("paper", "e", true));
        assert!(!adapter.get_bool("paper", "f", true));
        assert!(adapter.get_bool("paper", "missing", true));
    }

    #[test]
    fn get_list_splits_and_trims() {
        let adapter = FileConfigAdapter::from_string(
            "[calendar]\nweekdays = Mon, Tue ,Wed,,Thu\nholidays =\n",
        )
        .unwrap();
        assert_eq!(
            adapter.get_list("calendar", "weekdays"),
            Some(vec![
                "Mon".to_string(),
                "Tue".to_string(),
                "Wed".to_string(),
                "Thu".to_string()
            ])
        );
        assert_eq!(adapter.get_list("calendar", "missing"), None);
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[quotes]\npath = /srv/quotes.csv\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("quotes", "path"),
            Some("/srv/quotes.csv".to_string())
        );
    }

    #[test]
    fn from_file_reports_config_parse_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        match result {
            Err(TraderError::ConfigParse { file, .. }) => {
                assert_eq!(file, "/nonexistent/path/config.ini");
            }
            Err(other) => panic!("expected ConfigParse, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }
}
