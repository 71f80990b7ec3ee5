//! Domain error types.

/// Top-level error type for overnight.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    /// A quote or instrument lookup failed or timed out. The event stays due.
    #[error("{collaborator} unavailable: {reason}")]
    Collaborator {
        collaborator: &'static str,
        reason: String,
    },

    /// Ledger and position can no longer be trusted. Only a reset clears it.
    #[error("integrity violation: {reason}")]
    Integrity { reason: String },

    #[error("reset refused: confirmation must be {expected:?}")]
    ResetNotConfirmed { expected: &'static str },

    #[error("trading halted: {reason}")]
    Halted { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub fn selector(reason: impl Into<String>) -> Self {
        TraderError::Collaborator {
            collaborator: "instrument selector",
            reason: reason.into(),
        }
    }

    pub fn quotes(reason: impl Into<String>) -> Self {
        TraderError::Collaborator {
            collaborator: "quote provider",
            reason: reason.into(),
        }
    }

    pub fn integrity(reason: impl Into<String>) -> Self {
        TraderError::Integrity {
            reason: reason.into(),
        }
    }

    /// Retrying the same event later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TraderError::Collaborator { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            TraderError::ConfigParse { .. }
                | TraderError::ConfigMissing { .. }
                | TraderError::ConfigInvalid { .. }
        )
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Database { .. } | TraderError::DatabaseQuery { .. } => 3,
            TraderError::Integrity { .. } | TraderError::Halted { .. } => 4,
            TraderError::Collaborator { .. } => 5,
            TraderError::ResetNotConfirmed { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
