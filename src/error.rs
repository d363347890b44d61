use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Error taxonomy of the settlement engine.
///
/// Business-rule failures (`InsufficientBalance`, `BelowMinimum`, ...) carry
/// enough context for the caller to act on. `InvariantViolation` means a
/// conservation check failed and indicates a bug; callers should log it and
/// return a generic failure, never the message itself.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("commission rate must be within 0..=100, got {0}")]
    InvalidRate(Decimal),
    #[error("unknown payment purpose: {0}")]
    InvalidPurpose(String),
    #[error("{0}")]
    ValidationError(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("illegal transition: {0}")]
    IllegalTransition(String),
    #[error("insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },
    #[error("requested {requested} is below the minimum payout of {minimum}")]
    BelowMinimum {
        requested: Decimal,
        minimum: Decimal,
    },
    #[error("payout method is not configured")]
    PayoutMethodNotSet,
    #[error("duplicate transaction id: {0}")]
    DuplicateTransaction(String),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    #[error("payment verifier unavailable: {0}")]
    VerifierUnavailable(String),
    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(Box::new(err))
    }
}

impl From<csv::Error> for LedgerError {
    fn from(err: csv::Error) -> Self {
        Self::Internal(Box::new(err))
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for LedgerError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Internal(Box::new(err))
    }
}
