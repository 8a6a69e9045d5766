//! Rental ledger service: rental creation, returns, cancellations and the
//! listing/dashboard queries built on top of the ledger.
//!
//! A rental creation reserves the copy first and inserts the ledger row
//! second. When the insert fails the reservation is compensated, so a copy
//! never stays rented without an open rental.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::RentalConfig,
    error::{AppError, AppResult},
    models::rental::{
        DueStatus, NewRental, Rental, RentalActive, RentalFilter, RentalRecord, RentalStatus,
    },
    paging::{to_storage_index, PagedResult},
    repository::Repository,
};

/// Largest page a listing will serve.
const MAX_PAGE_SIZE: i64 = 100;

/// Open/on-time/due-soon/overdue counters for the dashboard, plus current
/// available stock. The first three partition the active rentals.
#[derive(Debug, Clone, Copy)]
pub struct DashboardCounts {
    pub active: i64,
    pub on_time: i64,
    pub due_soon: i64,
    pub overdue: i64,
    pub available_copies: i64,
}

/// Per-user rental counters
#[derive(Debug, Clone, Copy)]
pub struct UserRentalSummary {
    pub total: i64,
    pub active: i64,
    pub overdue: i64,
}

#[derive(Clone)]
pub struct RentalsService {
    repository: Repository,
    config: RentalConfig,
}

impl RentalsService {
    pub fn new(repository: Repository, config: RentalConfig) -> Self {
        Self { repository, config }
    }

    /// Get a rental by ID
    pub async fn get_rental(&self, rental_id: Uuid) -> AppResult<Rental> {
        self.repository.rentals.get_by_id(rental_id).await
    }

    /// Rent the oldest available copy of a book to a user.
    ///
    /// Duration and rate are fixed at creation: due date and total cost
    /// never change afterwards, late returns are surfaced by the due-date
    /// classification instead.
    pub async fn create_rental(
        &self,
        user_id: Uuid,
        book_id: Uuid,
        rental_days: i32,
        daily_rate: Option<Decimal>,
        notes: Option<String>,
    ) -> AppResult<Rental> {
        if rental_days < 1 {
            return Err(AppError::Validation(
                "Rental duration must be at least 1 day".to_string(),
            ));
        }
        self.repository.users.get_by_id(user_id).await?;
        if !self.repository.books.exists(book_id).await? {
            return Err(AppError::NotFound(format!(
                "Book with id {} not found",
                book_id
            )));
        }

        let copy = self
            .repository
            .book_copies
            .reserve_oldest_available(book_id)
            .await?;
        let daily_rate = daily_rate.unwrap_or(self.config.default_daily_rate);
        self.insert_with_compensation(user_id, copy.book_copy_id, rental_days, daily_rate, notes)
            .await
    }

    /// Rent one specific copy to a user, with the configured default
    /// duration and rate (the self-service path).
    pub async fn create_rental_for_copy(
        &self,
        user_id: Uuid,
        copy_id: Uuid,
        notes: Option<String>,
    ) -> AppResult<Rental> {
        self.repository.users.get_by_id(user_id).await?;
        let copy = self.repository.book_copies.reserve(copy_id).await?;
        self.insert_with_compensation(
            user_id,
            copy.book_copy_id,
            self.config.default_rental_days,
            self.config.default_daily_rate,
            notes,
        )
        .await
    }

    async fn insert_with_compensation(
        &self,
        user_id: Uuid,
        copy_id: Uuid,
        rental_days: i32,
        daily_rate: Decimal,
        notes: Option<String>,
    ) -> AppResult<Rental> {
        let now = Utc::now();
        let new_rental = NewRental {
            user_id,
            book_copy_id: copy_id,
            rental_date: now,
            due_date: now + Duration::days(rental_days as i64),
            rental_days,
            daily_rate,
            total_cost: daily_rate * Decimal::from(rental_days),
            notes,
        };

        match self.repository.rentals.insert(new_rental).await {
            Ok(rental) => {
                info!(
                    rental_id = %rental.rental_id,
                    %user_id,
                    %copy_id,
                    rental_days,
                    "Rental created"
                );
                Ok(rental)
            }
            Err(err) => {
                // Put the copy back before surfacing the failure.
                warn!(%copy_id, %err, "Rental insert failed, releasing reserved copy");
                if let Err(release_err) = self.repository.book_copies.release(copy_id).await {
                    error!(%copy_id, %release_err, "Failed to release copy after aborted rental");
                }
                Err(err)
            }
        }
    }

    /// Close a rental as returned and put its copy back in stock.
    pub async fn mark_returned(&self, rental_id: Uuid) -> AppResult<Rental> {
        let rental = self
            .repository
            .rentals
            .close(rental_id, RentalStatus::Returned, Some(Utc::now()))
            .await?;
        self.repository
            .book_copies
            .release(rental.book_copy_id)
            .await?;
        info!(%rental_id, copy_id = %rental.book_copy_id, "Rental returned");
        Ok(rental)
    }

    /// Cancel an open rental and put its copy back in stock. No return date
    /// is recorded.
    pub async fn cancel_rental(&self, rental_id: Uuid) -> AppResult<Rental> {
        let rental = self
            .repository
            .rentals
            .close(rental_id, RentalStatus::Cancelled, None)
            .await?;
        self.repository
            .book_copies
            .release(rental.book_copy_id)
            .await?;
        info!(%rental_id, copy_id = %rental.book_copy_id, "Rental cancelled");
        Ok(rental)
    }

    /// One page of open rentals, soonest due first.
    ///
    /// The due filter is applied to the fetched page; page totals always
    /// reflect the search and date filters only.
    pub async fn list_active(
        &self,
        page: i64,
        page_size: i64,
        filter: RentalFilter,
    ) -> AppResult<PagedResult<RentalActive>> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let offset = to_storage_index(page) * page_size;

        let total = self.repository.rentals.count_active_filtered(&filter).await?;
        let mut items = self
            .repository
            .rentals
            .find_active(&filter, page_size, offset)
            .await?;

        if let Some(due_filter) = filter.due_filter {
            let now = Utc::now();
            let window = Duration::days(self.config.due_soon_days.max(0));
            items.retain(|r| classify_due(r.due_date, now, window) == due_filter);
        }

        Ok(PagedResult::new(items, page, page_size, total))
    }

    /// Full rental history for reporting, oldest first
    pub async fn list_all(&self) -> AppResult<Vec<RentalRecord>> {
        self.repository.rentals.find_all_records().await
    }

    /// A user's open rentals, soonest due first
    pub async fn find_active_by_user(&self, user_id: Uuid) -> AppResult<Vec<Rental>> {
        self.repository.rentals.find_active_by_user(user_id).await
    }

    /// Rental counters for a user's profile page
    pub async fn user_rental_summary(&self, user_id: Uuid) -> AppResult<UserRentalSummary> {
        let now = Utc::now();
        Ok(UserRentalSummary {
            total: self.repository.rentals.count_by_user(user_id).await?,
            active: self.repository.rentals.count_active_by_user(user_id).await?,
            overdue: self
                .repository
                .rentals
                .count_overdue_by_user(user_id, now)
                .await?,
        })
    }

    /// Dashboard counters partitioning the active rentals by due status
    pub async fn dashboard_counts(&self) -> AppResult<DashboardCounts> {
        let now = Utc::now();
        let threshold = now + Duration::days(self.config.due_soon_days.max(0));
        Ok(DashboardCounts {
            active: self.repository.rentals.count_active().await?,
            on_time: self.repository.rentals.count_on_time(threshold).await?,
            due_soon: self.repository.rentals.count_due_soon(now, threshold).await?,
            overdue: self.repository.rentals.count_overdue(now).await?,
            available_copies: self
                .repository
                .book_copies
                .count_by_status(crate::models::book_copy::CopyStatus::Available)
                .await?,
        })
    }

    /// Most recently started rentals, any status
    pub async fn find_recent(&self, limit: i64) -> AppResult<Vec<Rental>> {
        self.repository.rentals.find_recent(limit).await
    }

    /// Open rentals due within the next `days` days, soonest first
    pub async fn find_upcoming_due(&self, days: i64) -> AppResult<Vec<Rental>> {
        let now = Utc::now();
        self.repository
            .rentals
            .find_upcoming_due(now, now + Duration::days(days.max(0)))
            .await
    }

    /// Open rentals whose due date has passed
    pub async fn find_overdue(&self) -> AppResult<Vec<Rental>> {
        self.repository.rentals.find_overdue(Utc::now()).await
    }
}

fn classify_due(due_date: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> DueStatus {
    if due_date < now {
        DueStatus::Overdue
    } else if due_date < now + window {
        DueStatus::DueSoon
    } else {
        DueStatus::OnTime
    }
}
