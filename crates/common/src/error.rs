use thiserror::Error;

#[derive(Debug, Error)]
pub enum VentasError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("external api error: {0}")]
    ExternalApi(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Run-level sync failure. The payload is the original error message;
    /// callers see the full `Sync failed: ...` string.
    #[error("Sync failed: {0}")]
    Sync(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type VentasResult<T> = Result<T, VentasError>;
