use thiserror::Error;

/// Application-wide error types.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A create/replace payload is missing required fields.
    #[error("Recipe is not valid. Missing/invalid fields: {}", missing.join(", "))]
    Validation { missing: Vec<String> },

    /// The resumption cursor names a recipe that no longer exists.
    ///
    /// Kept apart from an empty result so callers can tell "end of data"
    /// from "broken cursor".
    #[error("Unresolvable cursor: {0}")]
    UnresolvableCursor(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Helper conversion from anyhow::Error
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
