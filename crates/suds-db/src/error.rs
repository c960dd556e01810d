//! Store error taxonomy.
//!
//! Every store operation fails with one of these. The daemon maps them onto
//! HTTP statuses; the CLI prints them. None is treated as fatal — a failed
//! action leaves store and caller state untouched and the user retries.

/// Errors surfaced by [`crate::LaundryStore`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Malformed input: empty name, non-positive load count or amount.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The principal's role does not permit the attempted operation.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Row absent, or hidden from this principal by row-level policy.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Network / database unavailability.
    #[error("store transport error: {0}")]
    Transport(#[from] sqlx::Error),

    /// Missing or unusable deployment configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Row decoded from the store violates its own invariants.
    #[error("internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Validation(_) => "validation",
            StoreError::Authorization(_) => "authorization",
            StoreError::NotFound(_) => "not_found",
            StoreError::Transport(_) => "transport",
            StoreError::Config(_) => "config",
            StoreError::Internal(_) => "internal",
        }
    }
}

/// Classify a database error into the store taxonomy.
///
/// CHECK violations (SQLSTATE 23514) back the same constraints the
/// application validates up front, so they map to `Validation`; a write
/// rejected by a row-level-security policy surfaces as SQLSTATE 42501 and
/// maps to `Authorization`. Everything else is transport.
pub fn classify_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        match db_err.code().as_deref() {
            Some("23514") => {
                let detail = db_err
                    .constraint()
                    .map(|c| format!("constraint {c}"))
                    .unwrap_or_else(|| "check constraint".to_string());
                return StoreError::Validation(format!("rejected by store: {detail}"));
            }
            Some("42501") => {
                return StoreError::Authorization("rejected by row-level policy".to_string());
            }
            _ => {}
        }
    }
    StoreError::Transport(err)
}
