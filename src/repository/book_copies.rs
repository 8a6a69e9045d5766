//! Book copies repository for database operations.
//!
//! Reservation is a status-guarded conditional update: two racing rentals
//! for the last copy resolve in the database, the loser sees zero rows.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book_copy::{BookCopy, CopyStatus, UpdateCopy},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookCopyRepository: Send + Sync {
    async fn get_by_id(&self, copy_id: Uuid) -> AppResult<BookCopy>;
    /// All copies of a book, oldest first.
    async fn find_by_book(&self, book_id: Uuid) -> AppResult<Vec<BookCopy>>;
    /// Available copies of a book, oldest first (first-in-first-out stock).
    async fn find_available_by_book(&self, book_id: Uuid) -> AppResult<Vec<BookCopy>>;
    /// Atomically flip the oldest available copy of a book to `Rented`.
    async fn reserve_oldest_available(&self, book_id: Uuid) -> AppResult<BookCopy>;
    /// Atomically flip one specific copy to `Rented`.
    async fn reserve(&self, copy_id: Uuid) -> AppResult<BookCopy>;
    /// Flip a copy back to `Available` when its rental closes.
    async fn release(&self, copy_id: Uuid) -> AppResult<()>;
    async fn create_batch(
        &self,
        book_id: Uuid,
        quantity: i32,
        notes: Option<String>,
    ) -> AppResult<Vec<BookCopy>>;
    /// Update a copy's status/notes. The write is guarded: a copy that is
    /// rented at write time is never touched, whatever a prior read said.
    async fn update(&self, copy_id: Uuid, update: UpdateCopy) -> AppResult<BookCopy>;
    /// Set the status of several copies in one transaction. No row changes
    /// unless every copy exists and none is rented.
    async fn update_status_batch(
        &self,
        copy_ids: &[Uuid],
        status: CopyStatus,
    ) -> AppResult<Vec<BookCopy>>;
    async fn delete(&self, copy_id: Uuid) -> AppResult<()>;
    /// Whether any rental, open or historical, references the copy.
    async fn has_rentals(&self, copy_id: Uuid) -> AppResult<bool>;
    async fn count_by_status(&self, status: CopyStatus) -> AppResult<i64>;
    async fn count_available_for_book(&self, book_id: Uuid) -> AppResult<i64>;
}

#[derive(Clone)]
pub struct PgBookCopyRepository {
    pool: Pool<Postgres>,
}

impl PgBookCopyRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookCopyRepository for PgBookCopyRepository {
    async fn get_by_id(&self, copy_id: Uuid) -> AppResult<BookCopy> {
        sqlx::query_as::<_, BookCopy>("SELECT * FROM book_copies WHERE book_copy_id = $1")
            .bind(copy_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))
    }

    async fn find_by_book(&self, book_id: Uuid) -> AppResult<Vec<BookCopy>> {
        let copies = sqlx::query_as::<_, BookCopy>(
            "SELECT * FROM book_copies WHERE book_id = $1 ORDER BY created_at ASC",
        )
        .bind(book_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(copies)
    }

    async fn find_available_by_book(&self, book_id: Uuid) -> AppResult<Vec<BookCopy>> {
        let copies = sqlx::query_as::<_, BookCopy>(
            "SELECT * FROM book_copies WHERE book_id = $1 AND status = $2 ORDER BY created_at ASC",
        )
        .bind(book_id)
        .bind(CopyStatus::Available)
        .fetch_all(&self.pool)
        .await?;
        Ok(copies)
    }

    async fn reserve_oldest_available(&self, book_id: Uuid) -> AppResult<BookCopy> {
        sqlx::query_as::<_, BookCopy>(
            r#"
            UPDATE book_copies SET status = $2, updated_at = NOW()
            WHERE book_copy_id = (
                SELECT book_copy_id FROM book_copies
                WHERE book_id = $1 AND status = $3
                ORDER BY created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(book_id)
        .bind(CopyStatus::Rented)
        .bind(CopyStatus::Available)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::OutOfStock(format!("No available copies for book {}", book_id)))
    }

    async fn reserve(&self, copy_id: Uuid) -> AppResult<BookCopy> {
        let reserved = sqlx::query_as::<_, BookCopy>(
            r#"
            UPDATE book_copies SET status = $2, updated_at = NOW()
            WHERE book_copy_id = $1 AND status = $3
            RETURNING *
            "#,
        )
        .bind(copy_id)
        .bind(CopyStatus::Rented)
        .bind(CopyStatus::Available)
        .fetch_optional(&self.pool)
        .await?;

        match reserved {
            Some(copy) => Ok(copy),
            // Distinguish a missing copy from one that lost the race.
            None => {
                let copy = self.get_by_id(copy_id).await?;
                Err(AppError::CopyNotAvailable(format!(
                    "Copy {} is {}",
                    copy_id, copy.status
                )))
            }
        }
    }

    async fn release(&self, copy_id: Uuid) -> AppResult<()> {
        let rows = sqlx::query(
            "UPDATE book_copies SET status = $2, updated_at = NOW() WHERE book_copy_id = $1",
        )
        .bind(copy_id)
        .bind(CopyStatus::Available)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(AppError::NotFound(format!("Copy with id {} not found", copy_id)));
        }
        Ok(())
    }

    async fn create_batch(
        &self,
        book_id: Uuid,
        quantity: i32,
        notes: Option<String>,
    ) -> AppResult<Vec<BookCopy>> {
        let mut copies = Vec::with_capacity(quantity as usize);
        for _ in 0..quantity {
            let copy = sqlx::query_as::<_, BookCopy>(
                r#"
                INSERT INTO book_copies (book_copy_id, book_id, status, notes, created_at, updated_at)
                VALUES ($1, $2, $3, $4, NOW(), NOW())
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(book_id)
            .bind(CopyStatus::Available)
            .bind(&notes)
            .fetch_one(&self.pool)
            .await?;
            copies.push(copy);
        }
        Ok(copies)
    }

    async fn update(&self, copy_id: Uuid, update: UpdateCopy) -> AppResult<BookCopy> {
        let updated = sqlx::query_as::<_, BookCopy>(
            r#"
            UPDATE book_copies
            SET status = COALESCE($2, status),
                notes = COALESCE($3, notes),
                updated_at = NOW()
            WHERE book_copy_id = $1 AND status <> $4
            RETURNING *
            "#,
        )
        .bind(copy_id)
        .bind(update.status)
        .bind(update.notes)
        .bind(CopyStatus::Rented)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(copy) => Ok(copy),
            // Distinguish a missing copy from one rented since the caller's read.
            None => {
                self.get_by_id(copy_id).await?;
                Err(AppError::CopyCurrentlyRented(format!(
                    "Copy {} is out on loan",
                    copy_id
                )))
            }
        }
    }

    async fn update_status_batch(
        &self,
        copy_ids: &[Uuid],
        status: CopyStatus,
    ) -> AppResult<Vec<BookCopy>> {
        let mut tx = self.pool.begin().await?;
        let mut updated = Vec::with_capacity(copy_ids.len());
        for copy_id in copy_ids {
            let copy = sqlx::query_as::<_, BookCopy>(
                r#"
                UPDATE book_copies SET status = $2, updated_at = NOW()
                WHERE book_copy_id = $1 AND status <> $3
                RETURNING *
                "#,
            )
            .bind(copy_id)
            .bind(status)
            .bind(CopyStatus::Rented)
            .fetch_optional(&mut *tx)
            .await?;
            match copy {
                Some(copy) => updated.push(copy),
                // Dropping the transaction rolls back the rows already set.
                None => {
                    let exists: bool = sqlx::query_scalar(
                        "SELECT EXISTS(SELECT 1 FROM book_copies WHERE book_copy_id = $1)",
                    )
                    .bind(copy_id)
                    .fetch_one(&mut *tx)
                    .await?;
                    return Err(if exists {
                        AppError::CopyCurrentlyRented(format!("Copy {} is out on loan", copy_id))
                    } else {
                        AppError::NotFound(format!("Copy with id {} not found", copy_id))
                    });
                }
            }
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete(&self, copy_id: Uuid) -> AppResult<()> {
        let rows = sqlx::query("DELETE FROM book_copies WHERE book_copy_id = $1 AND status <> $2")
            .bind(copy_id)
            .bind(CopyStatus::Rented)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            self.get_by_id(copy_id).await?;
            return Err(AppError::CopyCurrentlyRented(format!(
                "Copy {} is out on loan",
                copy_id
            )));
        }
        Ok(())
    }

    async fn has_rentals(&self, copy_id: Uuid) -> AppResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rentals WHERE book_copy_id = $1)")
                .bind(copy_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn count_by_status(&self, status: CopyStatus) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM book_copies WHERE status = $1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_available_for_book(&self, book_id: Uuid) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM book_copies WHERE book_id = $1 AND status = $2",
        )
        .bind(book_id)
        .bind(CopyStatus::Available)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
