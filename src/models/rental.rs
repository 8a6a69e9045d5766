//! Rental (loan transaction) model, status machine and due classification

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Rental lifecycle status.
///
/// `InProgress` is the only non-terminal state: a rental is closed exactly
/// once, either by a return or by a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum RentalStatus {
    InProgress = 0,
    Returned = 1,
    Cancelled = 2,
}

impl RentalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RentalStatus::InProgress)
    }
}

impl From<i16> for RentalStatus {
    fn from(v: i16) -> Self {
        match v {
            1 => RentalStatus::Returned,
            2 => RentalStatus::Cancelled,
            _ => RentalStatus::InProgress,
        }
    }
}

impl From<RentalStatus> for i16 {
    fn from(s: RentalStatus) -> Self {
        s as i16
    }
}

impl std::fmt::Display for RentalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RentalStatus::InProgress => "In progress",
            RentalStatus::Returned => "Returned",
            RentalStatus::Cancelled => "Cancelled",
        };
        write!(f, "{}", label)
    }
}

/// Due-date classification of an open rental
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DueStatus {
    OnTime,
    DueSoon,
    Overdue,
}

/// Rental model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rental {
    pub rental_id: Uuid,
    pub user_id: Uuid,
    pub book_copy_id: Uuid,
    pub status: RentalStatus,
    pub rental_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub rental_days: i32,
    pub daily_rate: Decimal,
    pub total_cost: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rental {
    pub fn is_open(&self) -> bool {
        self.status == RentalStatus::InProgress
    }

    /// An open rental whose due date has already passed.
    pub fn is_overdue(&self, as_of: DateTime<Utc>) -> bool {
        self.is_open() && self.due_date < as_of
    }

    /// Partitions an open rental into exactly one of overdue, due-soon or
    /// on-time. Closed rentals are always reported on-time: the classification
    /// only has meaning while the copy is still out.
    pub fn classify(&self, as_of: DateTime<Utc>, due_soon_days: i64) -> DueStatus {
        if !self.is_open() {
            return DueStatus::OnTime;
        }
        if self.due_date < as_of {
            DueStatus::Overdue
        } else if self.due_date < as_of + Duration::days(due_soon_days.max(0)) {
            DueStatus::DueSoon
        } else {
            DueStatus::OnTime
        }
    }
}

/// Values persisted when a rental is created
#[derive(Debug, Clone)]
pub struct NewRental {
    pub user_id: Uuid,
    pub book_copy_id: Uuid,
    pub rental_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub rental_days: i32,
    pub daily_rate: Decimal,
    pub total_cost: Decimal,
    pub notes: Option<String>,
}

/// Active-rental row for the listing screens, joined with renter and book
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RentalActive {
    pub rental_id: Uuid,
    pub user_email: String,
    pub book_title: String,
    pub author_name: String,
    pub rental_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub days_until_due: i64,
}

/// Full-history row for reporting, any status
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RentalRecord {
    pub rental_id: Uuid,
    pub user_email: String,
    pub book_title: String,
    pub rental_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub total_cost: Decimal,
    pub status: RentalStatus,
}

/// Filters for the active-rentals listing
#[derive(Debug, Clone, Default)]
pub struct RentalFilter {
    /// Free-text match over renter email, book title and author name.
    pub search: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// Applied in memory after the page fetch.
    pub due_filter: Option<DueStatus>,
}
