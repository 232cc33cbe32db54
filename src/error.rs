//! error.rs
//!
//! Ошибки клиента сканирования. Ни одна из них не фатальна для процесса:
//! после любой ошибки сессия остаётся в состоянии `Idle`, `BookingLoaded`
//! или `ResultDisplayed`, и оператор может повторить действие.

use thiserror::Error;

use crate::models::SeatTypeId;

/// Причина локального отказа в запросе на сканирование. Сетевой вызов не выполняется.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("seat type {seat_type_id} is not part of this booking")]
    UnknownSeatType { seat_type_id: SeatTypeId },

    #[error("quantity to scan for seat type {seat_type_id} must be positive")]
    NonPositiveQuantity { seat_type_id: SeatTypeId },

    #[error("quantity {requested} for seat type {seat_type_id} exceeds remaining {remaining}")]
    ExceedsRemaining {
        seat_type_id: SeatTypeId,
        requested: u32,
        remaining: u32,
    },

    #[error("scan request contains nothing to scan")]
    EmptyRequest,

    #[error("scan request targets booking {actual}, but booking {expected} is loaded")]
    BookingMismatch { expected: i64, actual: i64 },

    #[error("scan request is signed by operator '{actual}', but the session belongs to '{expected}'")]
    OperatorMismatch { expected: String, actual: String },
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("booking code must not be empty")]
    EmptyBookingCode,

    #[error("booking '{code}' not found")]
    NotFound { code: String },

    #[error("scan request rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("no booking is loaded")]
    NoBooking,

    #[error("booking has no seats")]
    NoSeats,

    #[error("nothing left to scan")]
    NothingToScan,

    #[error("operation '{operation}' is not allowed in phase {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: &'static str,
    },

    #[error("no operator identity in the current session")]
    NoOperator,

    #[error("malformed scan request: {0}")]
    MalformedRequest(#[from] validator::ValidationErrors),

    #[error("scan authority rejected the request: {message}")]
    AuthorityRejected { message: String },

    #[error("scan authority temporarily unavailable")]
    AuthorityUnavailable,

    #[error("scan authority request failed: {0}")]
    Network(String),

    #[error("invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<reqwest::Error> for ScanError {
    fn from(e: reqwest::Error) -> Self {
        ScanError::Network(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}
