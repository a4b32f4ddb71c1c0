use thiserror::Error;

/// Failures reported by the store. Callers pass these through unchanged as a
/// `(message, type)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("The conditional request failed")]
    ConditionalCheckFailed,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Internal(String),
}

impl StoreError {
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::ConditionalCheckFailed => "KeyValueStore:ConditionalCheckFailedException",
            Self::Validation(_) => "KeyValueStore:ValidationException",
            Self::Internal(_) => "KeyValueStore:InternalServerError",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(format!("Corrupt item: {}", e))
    }
}
