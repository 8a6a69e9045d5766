//! Error types for the rental core

use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// No copy of the requested book is available for rental.
    #[error("Out of stock: {0}")]
    OutOfStock(String),

    /// The specific copy targeted by a self-service rental is not available.
    #[error("Copy not available: {0}")]
    CopyNotAvailable(String),

    /// Maintenance operation attempted on a copy that is out on loan.
    #[error("Copy currently rented: {0}")]
    CopyCurrentlyRented(String),

    /// Return/cancel attempted on a rental that is not in progress.
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Business-rule errors are recoverable and rendered to the end user;
    /// everything else aborts the operation with no partial state.
    pub fn is_business_rule(&self) -> bool {
        !matches!(self, AppError::Database(_) | AppError::Internal(_))
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
