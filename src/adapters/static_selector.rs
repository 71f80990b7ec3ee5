//! Instrument selector that always answers with one configured contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::error::TraderError;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_port::InstrumentSelector;

pub struct StaticSelector {
    instrument: String,
}

impl StaticSelector {
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TraderError> {
        let instrument = config
            .get_string("selector", "instrument")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TraderError::ConfigMissing {
                section: "selector".into(),
                key: "instrument".into(),
            })?;
        Ok(Self::new(instrument))
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }
}

#[async_trait]
impl InstrumentSelector for StaticSelector {
    async fn select(&self, _at: DateTime<Utc>) -> Result<Option<String>, TraderError> {
        Ok(Some(self.instrument.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    #[tokio::test]
    async fn selects_configured_instrument() {
        let config =
            FileConfigAdapter::from_string("[selector]\ninstrument = NIFTY 25000 CE\n").unwrap();
        let selector = StaticSelector::from_config(&config).unwrap();
        assert_eq!(
            selector.select(Utc::now()).await.unwrap(),
            Some("NIFTY 25000 CE".to_string())
        );
    }

    #[test]
    fn blank_instrument_is_missing() {
        let config = FileConfigAdapter::from_string("[selector]\ninstrument =\n").unwrap();
        assert!(matches!(
            StaticSelector::from_config(&config),
            Err(TraderError::ConfigMissing { .. })
        ));
    }
}
