use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Cannot {attempted} while order is {current}")]
    InvalidTransition { current: String, attempted: String },
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn invalid_transition(current: impl ToString, attempted: impl ToString) -> Self {
        DomainError::InvalidTransition {
            current: current.to_string(),
            attempted: attempted.to_string(),
        }
    }
}
