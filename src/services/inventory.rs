//! Copy inventory service: stock levels and administrative copy maintenance.
//!
//! The `Rented` status belongs to the rental ledger. Administrative
//! operations can never set it, and a copy that is out on loan rejects
//! every mutation until its rental closes.

use tracing::info;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book_copy::{BookCopy, CopyStatus, UpdateCopy},
    repository::Repository,
};

/// How many copies a single intake can register.
const MAX_BATCH_QUANTITY: i32 = 100;

#[derive(Clone)]
pub struct InventoryService {
    repository: Repository,
}

impl InventoryService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Get a copy by ID
    pub async fn get_copy(&self, copy_id: Uuid) -> AppResult<BookCopy> {
        self.repository.book_copies.get_by_id(copy_id).await
    }

    /// All copies of a book, oldest first
    pub async fn find_by_book(&self, book_id: Uuid) -> AppResult<Vec<BookCopy>> {
        self.repository.book_copies.find_by_book(book_id).await
    }

    /// Available copies of a book, oldest first
    pub async fn find_available_copies(&self, book_id: Uuid) -> AppResult<Vec<BookCopy>> {
        self.repository
            .book_copies
            .find_available_by_book(book_id)
            .await
    }

    pub async fn count_available_for_book(&self, book_id: Uuid) -> AppResult<i64> {
        self.repository
            .book_copies
            .count_available_for_book(book_id)
            .await
    }

    pub async fn count_by_status(&self, status: CopyStatus) -> AppResult<i64> {
        self.repository.book_copies.count_by_status(status).await
    }

    /// Take the oldest available copy of a book out of stock.
    ///
    /// The flip to `Rented` is a conditional update; with no available copy
    /// left this fails with `OutOfStock`.
    pub async fn reserve_one_copy(&self, book_id: Uuid) -> AppResult<BookCopy> {
        self.repository
            .book_copies
            .reserve_oldest_available(book_id)
            .await
    }

    /// Put a copy back in stock
    pub async fn release_copy(&self, copy_id: Uuid) -> AppResult<()> {
        self.repository.book_copies.release(copy_id).await
    }

    /// Whether administrative operations may touch the copy right now.
    /// Advisory only; the mutating writes re-check at the storage level.
    pub async fn can_mutate(&self, copy_id: Uuid) -> AppResult<bool> {
        let copy = self.repository.book_copies.get_by_id(copy_id).await?;
        Ok(copy.can_mutate())
    }

    /// Register a batch of new copies for a book, all starting `Available`.
    pub async fn create_copies(
        &self,
        book_id: Uuid,
        quantity: i32,
        notes: Option<String>,
    ) -> AppResult<Vec<BookCopy>> {
        if quantity < 1 {
            return Err(AppError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }
        if quantity > MAX_BATCH_QUANTITY {
            return Err(AppError::Validation(format!(
                "Quantity must be at most {}",
                MAX_BATCH_QUANTITY
            )));
        }
        if !self.repository.books.exists(book_id).await? {
            return Err(AppError::NotFound(format!(
                "Book with id {} not found",
                book_id
            )));
        }

        let copies = self
            .repository
            .book_copies
            .create_batch(book_id, quantity, notes)
            .await?;
        info!(%book_id, quantity, "Registered new copies");
        Ok(copies)
    }

    /// Update a copy's status and/or notes.
    ///
    /// Rejected while the copy is rented (the guard sits on the write
    /// itself, so a rental racing this edit still wins), and the target
    /// status can never be `Rented`.
    pub async fn update_copy(&self, copy_id: Uuid, update: UpdateCopy) -> AppResult<BookCopy> {
        if update.status == Some(CopyStatus::Rented) {
            return Err(AppError::Validation(
                "Copies are marked rented by the rental ledger, not by edits".to_string(),
            ));
        }
        self.repository.book_copies.update(copy_id, update).await
    }

    /// Set the status of several copies at once.
    ///
    /// All-or-nothing: if any copy is missing or rented, no copy is touched.
    pub async fn update_status_batch(
        &self,
        copy_ids: &[Uuid],
        status: CopyStatus,
    ) -> AppResult<Vec<BookCopy>> {
        if status == CopyStatus::Rented {
            return Err(AppError::Validation(
                "Copies are marked rented by the rental ledger, not by edits".to_string(),
            ));
        }
        let updated = self
            .repository
            .book_copies
            .update_status_batch(copy_ids, status)
            .await?;
        info!(count = updated.len(), %status, "Batch status update applied");
        Ok(updated)
    }

    /// Delete a copy.
    ///
    /// Rented copies cannot be deleted, and a copy with any rental history
    /// is kept for the ledger; discontinue it instead.
    pub async fn delete_copy(&self, copy_id: Uuid) -> AppResult<()> {
        let copy = self.repository.book_copies.get_by_id(copy_id).await?;
        if !copy.can_mutate() {
            return Err(AppError::CopyCurrentlyRented(format!(
                "Copy {} is out on loan",
                copy_id
            )));
        }
        if self.repository.book_copies.has_rentals(copy_id).await? {
            return Err(AppError::Conflict(format!(
                "Copy {} has rental history and cannot be deleted",
                copy_id
            )));
        }
        self.repository.book_copies.delete(copy_id).await?;
        info!(%copy_id, "Copy deleted");
        Ok(())
    }
}
