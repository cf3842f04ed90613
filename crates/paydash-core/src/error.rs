//! Error types for the guard, ledger and aggregator.

use thiserror::Error;
use uuid::Uuid;

/// Authentication and authorization failures. Every variant is a terminal
/// rejection of the calling operation; nothing here is retried.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown username or wrong password. Deliberately one variant so the
    /// caller cannot distinguish the two.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The account exists but has been deactivated.
    #[error("account is inactive")]
    AccountInactive,

    /// No token was presented on a protected call.
    #[error("missing token")]
    MissingToken,

    /// Signature verification failed or the token has expired.
    #[error("malformed or expired token")]
    MalformedOrExpiredToken,

    /// The token verified but its subject no longer exists in the store.
    #[error("token subject no longer exists")]
    SubjectNotFound,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Ledger write/read failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Amount was not strictly positive, or carried more than two decimal
    /// places of precision.
    #[error("amount must be positive with at most two decimal places")]
    InvalidAmount,

    #[error("receiver must not be empty")]
    EmptyReceiver,

    #[error("payment {0} not found")]
    NotFound(Uuid),

    /// Transaction-id collision that survived one regeneration retry.
    #[error("transaction id conflict persisted after retry")]
    PersistenceConflict,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
