//! Rentals repository for database operations.
//!
//! Owns the rental rows and the ledger-derived statistics queries. Status
//! transitions go through [`RentalRepository::close`], a guarded update that
//! only touches rentals still in progress.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        author::AuthorStatus,
        book_copy::CopyStatus,
        rental::{NewRental, Rental, RentalActive, RentalFilter, RentalRecord, RentalStatus},
        stats::{AuthorRentalStats, BookRentalCounts},
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RentalRepository: Send + Sync {
    async fn get_by_id(&self, rental_id: Uuid) -> AppResult<Rental>;
    async fn insert(&self, rental: NewRental) -> AppResult<Rental>;
    /// Close an in-progress rental with the given terminal status. Fails with
    /// `InvalidTransition` when the rental is already closed.
    async fn close(
        &self,
        rental_id: Uuid,
        status: RentalStatus,
        return_date: Option<DateTime<Utc>>,
    ) -> AppResult<Rental>;

    /// One page of open rentals matching the search/date filters, soonest due first.
    async fn find_active(
        &self,
        filter: &RentalFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<RentalActive>>;
    async fn count_active_filtered(&self, filter: &RentalFilter) -> AppResult<i64>;
    /// Full rental history joined with renter/book, oldest first.
    async fn find_all_records(&self) -> AppResult<Vec<RentalRecord>>;

    async fn find_active_by_user(&self, user_id: Uuid) -> AppResult<Vec<Rental>>;
    async fn find_recent(&self, limit: i64) -> AppResult<Vec<Rental>>;
    async fn find_upcoming_due(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Rental>>;
    async fn find_overdue(&self, as_of: DateTime<Utc>) -> AppResult<Vec<Rental>>;

    async fn count_active(&self) -> AppResult<i64>;
    async fn count_on_time(&self, due_soon_threshold: DateTime<Utc>) -> AppResult<i64>;
    async fn count_due_soon(
        &self,
        as_of: DateTime<Utc>,
        due_soon_threshold: DateTime<Utc>,
    ) -> AppResult<i64>;
    async fn count_overdue(&self, as_of: DateTime<Utc>) -> AppResult<i64>;
    async fn count_by_user(&self, user_id: Uuid) -> AppResult<i64>;
    async fn count_active_by_user(&self, user_id: Uuid) -> AppResult<i64>;
    async fn count_overdue_by_user(&self, user_id: Uuid, as_of: DateTime<Utc>) -> AppResult<i64>;

    /// Raw per-book rental tallies; ordering and truncation belong to the
    /// statistics service.
    async fn book_rental_counts(&self, category_id: Option<Uuid>)
        -> AppResult<Vec<BookRentalCounts>>;
    /// Raw per-author rental tallies through the book/copy joins.
    async fn author_rental_counts(
        &self,
        country_id: Option<Uuid>,
        status: Option<AuthorStatus>,
    ) -> AppResult<Vec<AuthorRentalStats>>;
}

/// Parameters: $1 category filter, $2 in-progress status.
const BOOK_RENTAL_COUNTS_SQL: &str = r#"
    SELECT b.book_id, b.title, b.isbn,
           a.full_name AS author_name, c.category_name,
           COUNT(r.rental_id) AS total_rentals,
           COUNT(r.rental_id) FILTER (WHERE r.status = $2) AS active_rentals,
           COUNT(r.rental_id) FILTER (WHERE r.rental_date::date = CURRENT_DATE - 1) AS yesterday_rentals,
           COUNT(r.rental_id) FILTER (WHERE r.rental_date::date = CURRENT_DATE) AS today_rentals
    FROM books b
    JOIN authors a ON b.author_id = a.author_id
    JOIN categories c ON b.category_id = c.category_id
    JOIN book_copies bc ON bc.book_id = b.book_id
    JOIN rentals r ON r.book_copy_id = bc.book_copy_id
    WHERE ($1::uuid IS NULL OR b.category_id = $1)
    GROUP BY b.book_id, b.title, b.isbn, a.full_name, c.category_name
"#;

/// Parameters: $1 country filter, $2 author status filter, $3 available
/// copy status.
const AUTHOR_RENTAL_COUNTS_SQL: &str = r#"
    SELECT a.author_id, a.full_name, a.pseudonym, a.photo_url, co.country_name,
           COUNT(DISTINCT b.book_id) AS total_books,
           COUNT(DISTINCT bc.book_copy_id) AS total_copies,
           COUNT(DISTINCT bc.book_copy_id) FILTER (WHERE bc.status = $3) AS available_copies,
           COUNT(r.rental_id) AS total_rentals
    FROM authors a
    LEFT JOIN countries co ON a.country_id = co.country_id
    LEFT JOIN books b ON b.author_id = a.author_id
    LEFT JOIN book_copies bc ON bc.book_id = b.book_id
    LEFT JOIN rentals r ON r.book_copy_id = bc.book_copy_id
    WHERE ($1::uuid IS NULL OR a.country_id = $1)
      AND ($2::smallint IS NULL OR a.status = $2)
    GROUP BY a.author_id, a.full_name, a.pseudonym, a.photo_url, co.country_name
"#;

#[derive(Clone)]
pub struct PgRentalRepository {
    pool: Pool<Postgres>,
}

impl PgRentalRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RentalRepository for PgRentalRepository {
    async fn get_by_id(&self, rental_id: Uuid) -> AppResult<Rental> {
        sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE rental_id = $1")
            .bind(rental_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rental with id {} not found", rental_id)))
    }

    async fn insert(&self, rental: NewRental) -> AppResult<Rental> {
        let inserted = sqlx::query_as::<_, Rental>(
            r#"
            INSERT INTO rentals (
                rental_id, user_id, book_copy_id, status, rental_date, due_date,
                rental_days, daily_rate, total_cost, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(rental.user_id)
        .bind(rental.book_copy_id)
        .bind(RentalStatus::InProgress)
        .bind(rental.rental_date)
        .bind(rental.due_date)
        .bind(rental.rental_days)
        .bind(rental.daily_rate)
        .bind(rental.total_cost)
        .bind(&rental.notes)
        .fetch_one(&self.pool)
        .await?;
        Ok(inserted)
    }

    async fn close(
        &self,
        rental_id: Uuid,
        status: RentalStatus,
        return_date: Option<DateTime<Utc>>,
    ) -> AppResult<Rental> {
        let closed = sqlx::query_as::<_, Rental>(
            r#"
            UPDATE rentals SET status = $2, return_date = $3, updated_at = NOW()
            WHERE rental_id = $1 AND status = $4
            RETURNING *
            "#,
        )
        .bind(rental_id)
        .bind(status)
        .bind(return_date)
        .bind(RentalStatus::InProgress)
        .fetch_optional(&self.pool)
        .await?;

        match closed {
            Some(rental) => Ok(rental),
            // Distinguish a missing rental from a duplicate close.
            None => {
                let rental = self.get_by_id(rental_id).await?;
                Err(AppError::InvalidTransition(format!(
                    "Rental {} is already {}",
                    rental_id, rental.status
                )))
            }
        }
    }

    async fn find_active(
        &self,
        filter: &RentalFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<RentalActive>> {
        let rows = sqlx::query_as::<_, RentalActive>(
            r#"
            SELECT r.rental_id, u.email AS user_email, b.title AS book_title,
                   a.full_name AS author_name, r.rental_date, r.due_date,
                   (r.due_date::date - CURRENT_DATE)::bigint AS days_until_due
            FROM rentals r
            JOIN users u ON r.user_id = u.user_id
            JOIN book_copies bc ON r.book_copy_id = bc.book_copy_id
            JOIN books b ON bc.book_id = b.book_id
            JOIN authors a ON b.author_id = a.author_id
            WHERE r.status = $1
              AND r.return_date IS NULL
              AND ($2::text IS NULL OR $2 = ''
                   OR u.email ILIKE '%' || $2 || '%'
                   OR b.title ILIKE '%' || $2 || '%'
                   OR a.full_name ILIKE '%' || $2 || '%')
              AND ($3::timestamptz IS NULL OR r.rental_date >= $3)
              AND ($4::timestamptz IS NULL OR r.rental_date <= $4)
            ORDER BY r.due_date ASC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(RentalStatus::InProgress)
        .bind(&filter.search)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_active_filtered(&self, filter: &RentalFilter) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM rentals r
            JOIN users u ON r.user_id = u.user_id
            JOIN book_copies bc ON r.book_copy_id = bc.book_copy_id
            JOIN books b ON bc.book_id = b.book_id
            JOIN authors a ON b.author_id = a.author_id
            WHERE r.status = $1
              AND r.return_date IS NULL
              AND ($2::text IS NULL OR $2 = ''
                   OR u.email ILIKE '%' || $2 || '%'
                   OR b.title ILIKE '%' || $2 || '%'
                   OR a.full_name ILIKE '%' || $2 || '%')
              AND ($3::timestamptz IS NULL OR r.rental_date >= $3)
              AND ($4::timestamptz IS NULL OR r.rental_date <= $4)
            "#,
        )
        .bind(RentalStatus::InProgress)
        .bind(&filter.search)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn find_all_records(&self) -> AppResult<Vec<RentalRecord>> {
        let rows = sqlx::query_as::<_, RentalRecord>(
            r#"
            SELECT r.rental_id, u.email AS user_email, b.title AS book_title,
                   r.rental_date, r.due_date, r.return_date, r.total_cost, r.status
            FROM rentals r
            JOIN users u ON r.user_id = u.user_id
            JOIN book_copies bc ON r.book_copy_id = bc.book_copy_id
            JOIN books b ON bc.book_id = b.book_id
            ORDER BY r.rental_date ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn find_active_by_user(&self, user_id: Uuid) -> AppResult<Vec<Rental>> {
        let rentals = sqlx::query_as::<_, Rental>(
            "SELECT * FROM rentals WHERE user_id = $1 AND status = $2 ORDER BY due_date ASC",
        )
        .bind(user_id)
        .bind(RentalStatus::InProgress)
        .fetch_all(&self.pool)
        .await?;
        Ok(rentals)
    }

    async fn find_recent(&self, limit: i64) -> AppResult<Vec<Rental>> {
        let rentals =
            sqlx::query_as::<_, Rental>("SELECT * FROM rentals ORDER BY rental_date DESC LIMIT $1")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        Ok(rentals)
    }

    async fn find_upcoming_due(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Rental>> {
        let rentals = sqlx::query_as::<_, Rental>(
            r#"
            SELECT * FROM rentals
            WHERE status = $1 AND due_date BETWEEN $2 AND $3
            ORDER BY due_date ASC
            "#,
        )
        .bind(RentalStatus::InProgress)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rentals)
    }

    async fn find_overdue(&self, as_of: DateTime<Utc>) -> AppResult<Vec<Rental>> {
        let rentals = sqlx::query_as::<_, Rental>(
            "SELECT * FROM rentals WHERE status = $1 AND due_date < $2 ORDER BY due_date ASC",
        )
        .bind(RentalStatus::InProgress)
        .bind(as_of)
        .fetch_all(&self.pool)
        .await?;
        Ok(rentals)
    }

    async fn count_active(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rentals WHERE status = $1")
            .bind(RentalStatus::InProgress)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_on_time(&self, due_soon_threshold: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rentals WHERE status = $1 AND due_date >= $2",
        )
        .bind(RentalStatus::InProgress)
        .bind(due_soon_threshold)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_due_soon(
        &self,
        as_of: DateTime<Utc>,
        due_soon_threshold: DateTime<Utc>,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rentals WHERE status = $1 AND due_date >= $2 AND due_date < $3",
        )
        .bind(RentalStatus::InProgress)
        .bind(as_of)
        .bind(due_soon_threshold)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_overdue(&self, as_of: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rentals WHERE status = $1 AND due_date < $2",
        )
        .bind(RentalStatus::InProgress)
        .bind(as_of)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn count_by_user(&self, user_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rentals WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_active_by_user(&self, user_id: Uuid) -> AppResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM rentals WHERE user_id = $1 AND status = $2")
                .bind(user_id)
                .bind(RentalStatus::InProgress)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    async fn count_overdue_by_user(&self, user_id: Uuid, as_of: DateTime<Utc>) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM rentals WHERE user_id = $1 AND status = $2 AND due_date < $3",
        )
        .bind(user_id)
        .bind(RentalStatus::InProgress)
        .bind(as_of)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn book_rental_counts(
        &self,
        category_id: Option<Uuid>,
    ) -> AppResult<Vec<BookRentalCounts>> {
        let counts = sqlx::query_as::<_, BookRentalCounts>(BOOK_RENTAL_COUNTS_SQL)
            .bind(category_id)
            .bind(RentalStatus::InProgress)
            .fetch_all(&self.pool)
            .await?;
        Ok(counts)
    }

    async fn author_rental_counts(
        &self,
        country_id: Option<Uuid>,
        status: Option<AuthorStatus>,
    ) -> AppResult<Vec<AuthorRentalStats>> {
        let counts = sqlx::query_as::<_, AuthorRentalStats>(AUTHOR_RENTAL_COUNTS_SQL)
            .bind(country_id)
            .bind(status)
            .bind(CopyStatus::Available)
            .fetch_all(&self.pool)
            .await?;
        Ok(counts)
    }
}
