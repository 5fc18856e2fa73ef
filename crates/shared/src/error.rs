//! Error types for Deskhub

use thiserror::Error;

/// Discriminated result of a ticket lifecycle operation.
///
/// Callers receive the specific kind; `AlreadyClaimed` and `InvalidTransition`
/// are terminal for that call and must not be blindly retried.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Ticket not found")]
    NotFound,

    #[error("Ticket already claimed")]
    AlreadyClaimed,

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
