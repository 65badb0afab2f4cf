use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SlaError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("issue {issue_id} is {status} and can no longer be assigned")]
    StaleState { issue_id: Uuid, status: &'static str },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl SlaError {
    pub fn issue_not_found(id: Uuid) -> Self {
        SlaError::NotFound { entity: "issue", id }
    }

    pub fn provider_not_found(id: Uuid) -> Self {
        SlaError::NotFound {
            entity: "provider",
            id,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SlaError::NotFound { .. } => "not_found",
            SlaError::StaleState { .. } => "stale_state",
            SlaError::InvalidInput(_) => "invalid_input",
            SlaError::Timeout { .. } => "timeout",
            SlaError::Database(_) => "database_error",
        }
    }
}
