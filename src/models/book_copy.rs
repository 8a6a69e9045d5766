//! Book copy (physical, loanable instance of a book) model and status

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Copy availability status.
///
/// `Rented` is only ever set by the rental ledger; administrative status
/// changes are limited to the other three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum CopyStatus {
    Available = 0,
    Rented = 1,
    Maintenance = 2,
    Discontinued = 3,
}

impl From<i16> for CopyStatus {
    fn from(v: i16) -> Self {
        match v {
            1 => CopyStatus::Rented,
            2 => CopyStatus::Maintenance,
            3 => CopyStatus::Discontinued,
            _ => CopyStatus::Available,
        }
    }
}

impl From<CopyStatus> for i16 {
    fn from(s: CopyStatus) -> Self {
        s as i16
    }
}

impl std::fmt::Display for CopyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CopyStatus::Available => "Available",
            CopyStatus::Rented => "Rented",
            CopyStatus::Maintenance => "Maintenance",
            CopyStatus::Discontinued => "Discontinued",
        };
        write!(f, "{}", label)
    }
}

/// Book copy model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BookCopy {
    pub book_copy_id: Uuid,
    pub book_id: Uuid,
    pub status: CopyStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookCopy {
    /// A copy that is out on loan cannot be edited, re-statused or deleted.
    pub fn can_mutate(&self) -> bool {
        self.status != CopyStatus::Rented
    }
}

/// Administrative update of a single copy
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCopy {
    pub status: Option<CopyStatus>,
    pub notes: Option<String>,
}
