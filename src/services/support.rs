//! In-memory repository fake for service tests.
//!
//! One `Mutex`-guarded store implements all four repository traits with the
//! same guarded-update semantics as the Postgres implementations, so the
//! services exercise their real control flow without a database. The
//! statistics tallies are SQL-only and stubbed empty here; stats tests mock
//! the repository trait instead.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        author::AuthorStatus,
        book::Book,
        book_copy::{BookCopy, CopyStatus, UpdateCopy},
        rental::{NewRental, Rental, RentalActive, RentalFilter, RentalRecord, RentalStatus},
        stats::{AuthorRentalStats, BookRentalCounts},
        user::User,
    },
    repository::{BookCopyRepository, BookRepository, Repository, RentalRepository, UserRepository},
};

#[derive(Default)]
struct State {
    users: Vec<User>,
    books: Vec<Book>,
    author_names: HashMap<Uuid, String>,
    copies: Vec<BookCopy>,
    rentals: Vec<Rental>,
    fail_next_rental_insert: bool,
}

#[derive(Default)]
pub(crate) struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wire the store into a [`Repository`] as every aggregate at once.
    pub fn repository(self: &Arc<Self>) -> Repository {
        Repository::from_parts(
            self.clone(),
            self.clone(),
            self.clone(),
            self.clone(),
        )
    }

    pub fn add_user(&self, email: &str) -> User {
        let user = User {
            user_id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: None,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().users.push(user.clone());
        user
    }

    pub fn add_book(&self, title: &str, author_name: &str) -> Book {
        let now = Utc::now();
        let author_id = Uuid::new_v4();
        let book = Book {
            book_id: Uuid::new_v4(),
            title: title.to_string(),
            isbn: None,
            author_id,
            category_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.lock().unwrap();
        state.author_names.insert(author_id, author_name.to_string());
        state.books.push(book.clone());
        book
    }

    pub fn add_copy(&self, book_id: Uuid, status: CopyStatus) -> BookCopy {
        let now = Utc::now();
        let copy = BookCopy {
            book_copy_id: Uuid::new_v4(),
            book_id,
            status,
            notes: None,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().unwrap().copies.push(copy.clone());
        copy
    }

    pub fn copy_status(&self, copy_id: Uuid) -> CopyStatus {
        self.state
            .lock()
            .unwrap()
            .copies
            .iter()
            .find(|c| c.book_copy_id == copy_id)
            .map(|c| c.status)
            .expect("copy not in store")
    }

    /// Snapshot of every copy in the store
    pub fn copies(&self) -> Vec<BookCopy> {
        self.state.lock().unwrap().copies.clone()
    }

    /// Snapshot of every rental in the store
    pub fn rentals(&self) -> Vec<Rental> {
        self.state.lock().unwrap().rentals.clone()
    }

    /// Make the next rental insert fail with a database error.
    pub fn fail_next_rental_insert(&self) {
        self.state.lock().unwrap().fail_next_rental_insert = true;
    }

    fn active_joined(&self, filter: &RentalFilter) -> Vec<RentalActive> {
        let state = self.state.lock().unwrap();
        let today = Utc::now().date_naive();
        let mut rows: Vec<RentalActive> = state
            .rentals
            .iter()
            .filter(|r| r.status == RentalStatus::InProgress && r.return_date.is_none())
            .filter(|r| {
                filter.date_from.map_or(true, |from| r.rental_date >= from)
                    && filter.date_to.map_or(true, |to| r.rental_date <= to)
            })
            .filter_map(|r| {
                let user = state.users.iter().find(|u| u.user_id == r.user_id)?;
                let copy = state
                    .copies
                    .iter()
                    .find(|c| c.book_copy_id == r.book_copy_id)?;
                let book = state.books.iter().find(|b| b.book_id == copy.book_id)?;
                let author = state
                    .author_names
                    .get(&book.author_id)
                    .cloned()
                    .unwrap_or_default();
                Some(RentalActive {
                    rental_id: r.rental_id,
                    user_email: user.email.clone(),
                    book_title: book.title.clone(),
                    author_name: author,
                    rental_date: r.rental_date,
                    due_date: r.due_date,
                    days_until_due: (r.due_date.date_naive() - today).num_days(),
                })
            })
            .filter(|row| match filter.search.as_deref() {
                None | Some("") => true,
                Some(q) => {
                    let q = q.to_lowercase();
                    row.user_email.to_lowercase().contains(&q)
                        || row.book_title.to_lowercase().contains(&q)
                        || row.author_name.to_lowercase().contains(&q)
                }
            })
            .collect();
        rows.sort_by_key(|r| r.due_date);
        rows
    }
}

#[async_trait]
impl BookRepository for InMemoryStore {
    async fn get_by_id(&self, book_id: Uuid) -> AppResult<Book> {
        self.state
            .lock()
            .unwrap()
            .books
            .iter()
            .find(|b| b.book_id == book_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))
    }

    async fn exists(&self, book_id: Uuid) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .books
            .iter()
            .any(|b| b.book_id == book_id))
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn get_by_id(&self, user_id: Uuid) -> AppResult<User> {
        self.state
            .lock()
            .unwrap()
            .users
            .iter()
            .find(|u| u.user_id == user_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", user_id)))
    }
}

#[async_trait]
impl BookCopyRepository for InMemoryStore {
    async fn get_by_id(&self, copy_id: Uuid) -> AppResult<BookCopy> {
        self.state
            .lock()
            .unwrap()
            .copies
            .iter()
            .find(|c| c.book_copy_id == copy_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))
    }

    async fn find_by_book(&self, book_id: Uuid) -> AppResult<Vec<BookCopy>> {
        let mut copies: Vec<BookCopy> = self
            .state
            .lock()
            .unwrap()
            .copies
            .iter()
            .filter(|c| c.book_id == book_id)
            .cloned()
            .collect();
        copies.sort_by_key(|c| c.created_at);
        Ok(copies)
    }

    async fn find_available_by_book(&self, book_id: Uuid) -> AppResult<Vec<BookCopy>> {
        let mut copies: Vec<BookCopy> = self
            .state
            .lock()
            .unwrap()
            .copies
            .iter()
            .filter(|c| c.book_id == book_id && c.status == CopyStatus::Available)
            .cloned()
            .collect();
        copies.sort_by_key(|c| c.created_at);
        Ok(copies)
    }

    async fn reserve_oldest_available(&self, book_id: Uuid) -> AppResult<BookCopy> {
        let mut state = self.state.lock().unwrap();
        let oldest = state
            .copies
            .iter_mut()
            .filter(|c| c.book_id == book_id && c.status == CopyStatus::Available)
            .min_by_key(|c| c.created_at);
        match oldest {
            Some(copy) => {
                copy.status = CopyStatus::Rented;
                copy.updated_at = Utc::now();
                Ok(copy.clone())
            }
            None => Err(AppError::OutOfStock(format!(
                "No available copies for book {}",
                book_id
            ))),
        }
    }

    async fn reserve(&self, copy_id: Uuid) -> AppResult<BookCopy> {
        let mut state = self.state.lock().unwrap();
        let copy = state
            .copies
            .iter_mut()
            .find(|c| c.book_copy_id == copy_id)
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))?;
        if copy.status != CopyStatus::Available {
            return Err(AppError::CopyNotAvailable(format!(
                "Copy {} is {}",
                copy_id, copy.status
            )));
        }
        copy.status = CopyStatus::Rented;
        copy.updated_at = Utc::now();
        Ok(copy.clone())
    }

    async fn release(&self, copy_id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let copy = state
            .copies
            .iter_mut()
            .find(|c| c.book_copy_id == copy_id)
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))?;
        copy.status = CopyStatus::Available;
        copy.updated_at = Utc::now();
        Ok(())
    }

    async fn create_batch(
        &self,
        book_id: Uuid,
        quantity: i32,
        notes: Option<String>,
    ) -> AppResult<Vec<BookCopy>> {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        let mut created = Vec::with_capacity(quantity as usize);
        for _ in 0..quantity {
            let copy = BookCopy {
                book_copy_id: Uuid::new_v4(),
                book_id,
                status: CopyStatus::Available,
                notes: notes.clone(),
                created_at: now,
                updated_at: now,
            };
            state.copies.push(copy.clone());
            created.push(copy);
        }
        Ok(created)
    }

    async fn update(&self, copy_id: Uuid, update: UpdateCopy) -> AppResult<BookCopy> {
        let mut state = self.state.lock().unwrap();
        let copy = state
            .copies
            .iter_mut()
            .find(|c| c.book_copy_id == copy_id)
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))?;
        if copy.status == CopyStatus::Rented {
            return Err(AppError::CopyCurrentlyRented(format!(
                "Copy {} is out on loan",
                copy_id
            )));
        }
        if let Some(status) = update.status {
            copy.status = status;
        }
        if let Some(notes) = update.notes {
            copy.notes = Some(notes);
        }
        copy.updated_at = Utc::now();
        Ok(copy.clone())
    }

    async fn update_status_batch(
        &self,
        copy_ids: &[Uuid],
        status: CopyStatus,
    ) -> AppResult<Vec<BookCopy>> {
        let mut state = self.state.lock().unwrap();
        for copy_id in copy_ids {
            let copy = state
                .copies
                .iter()
                .find(|c| c.book_copy_id == *copy_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!("Copy with id {} not found", copy_id))
                })?;
            if copy.status == CopyStatus::Rented {
                return Err(AppError::CopyCurrentlyRented(format!(
                    "Copy {} is out on loan",
                    copy_id
                )));
            }
        }
        let mut updated = Vec::with_capacity(copy_ids.len());
        for copy_id in copy_ids {
            let copy = state
                .copies
                .iter_mut()
                .find(|c| c.book_copy_id == *copy_id)
                .expect("checked above");
            copy.status = status;
            copy.updated_at = Utc::now();
            updated.push(copy.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, copy_id: Uuid) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        let copy = state
            .copies
            .iter()
            .find(|c| c.book_copy_id == copy_id)
            .ok_or_else(|| AppError::NotFound(format!("Copy with id {} not found", copy_id)))?;
        if copy.status == CopyStatus::Rented {
            return Err(AppError::CopyCurrentlyRented(format!(
                "Copy {} is out on loan",
                copy_id
            )));
        }
        state.copies.retain(|c| c.book_copy_id != copy_id);
        Ok(())
    }

    async fn has_rentals(&self, copy_id: Uuid) -> AppResult<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .any(|r| r.book_copy_id == copy_id))
    }

    async fn count_by_status(&self, status: CopyStatus) -> AppResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .copies
            .iter()
            .filter(|c| c.status == status)
            .count() as i64)
    }

    async fn count_available_for_book(&self, book_id: Uuid) -> AppResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .copies
            .iter()
            .filter(|c| c.book_id == book_id && c.status == CopyStatus::Available)
            .count() as i64)
    }
}

#[async_trait]
impl RentalRepository for InMemoryStore {
    async fn get_by_id(&self, rental_id: Uuid) -> AppResult<Rental> {
        self.state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .find(|r| r.rental_id == rental_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Rental with id {} not found", rental_id)))
    }

    async fn insert(&self, rental: NewRental) -> AppResult<Rental> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_rental_insert {
            state.fail_next_rental_insert = false;
            return Err(AppError::Database(sqlx::Error::PoolClosed));
        }
        let now = Utc::now();
        let stored = Rental {
            rental_id: Uuid::new_v4(),
            user_id: rental.user_id,
            book_copy_id: rental.book_copy_id,
            status: RentalStatus::InProgress,
            rental_date: rental.rental_date,
            due_date: rental.due_date,
            return_date: None,
            rental_days: rental.rental_days,
            daily_rate: rental.daily_rate,
            total_cost: rental.total_cost,
            notes: rental.notes,
            created_at: now,
            updated_at: now,
        };
        state.rentals.push(stored.clone());
        Ok(stored)
    }

    async fn close(
        &self,
        rental_id: Uuid,
        status: RentalStatus,
        return_date: Option<DateTime<Utc>>,
    ) -> AppResult<Rental> {
        let mut state = self.state.lock().unwrap();
        let rental = state
            .rentals
            .iter_mut()
            .find(|r| r.rental_id == rental_id)
            .ok_or_else(|| AppError::NotFound(format!("Rental with id {} not found", rental_id)))?;
        if rental.status != RentalStatus::InProgress {
            return Err(AppError::InvalidTransition(format!(
                "Rental {} is already {}",
                rental_id, rental.status
            )));
        }
        rental.status = status;
        rental.return_date = return_date;
        rental.updated_at = Utc::now();
        Ok(rental.clone())
    }

    async fn find_active(
        &self,
        filter: &RentalFilter,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<RentalActive>> {
        let rows = self.active_joined(filter);
        Ok(rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_active_filtered(&self, filter: &RentalFilter) -> AppResult<i64> {
        Ok(self.active_joined(filter).len() as i64)
    }

    async fn find_all_records(&self) -> AppResult<Vec<RentalRecord>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<RentalRecord> = state
            .rentals
            .iter()
            .filter_map(|r| {
                let user = state.users.iter().find(|u| u.user_id == r.user_id)?;
                let copy = state
                    .copies
                    .iter()
                    .find(|c| c.book_copy_id == r.book_copy_id)?;
                let book = state.books.iter().find(|b| b.book_id == copy.book_id)?;
                Some(RentalRecord {
                    rental_id: r.rental_id,
                    user_email: user.email.clone(),
                    book_title: book.title.clone(),
                    rental_date: r.rental_date,
                    due_date: r.due_date,
                    return_date: r.return_date,
                    total_cost: r.total_cost,
                    status: r.status,
                })
            })
            .collect();
        rows.sort_by_key(|r| r.rental_date);
        Ok(rows)
    }

    async fn find_active_by_user(&self, user_id: Uuid) -> AppResult<Vec<Rental>> {
        let mut rentals: Vec<Rental> = self
            .state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .filter(|r| r.user_id == user_id && r.status == RentalStatus::InProgress)
            .cloned()
            .collect();
        rentals.sort_by_key(|r| r.due_date);
        Ok(rentals)
    }

    async fn find_recent(&self, limit: i64) -> AppResult<Vec<Rental>> {
        let mut rentals = self.state.lock().unwrap().rentals.clone();
        rentals.sort_by(|a, b| b.rental_date.cmp(&a.rental_date));
        rentals.truncate(limit.max(0) as usize);
        Ok(rentals)
    }

    async fn find_upcoming_due(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> AppResult<Vec<Rental>> {
        let mut rentals: Vec<Rental> = self
            .state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .filter(|r| {
                r.status == RentalStatus::InProgress && r.due_date >= from && r.due_date <= to
            })
            .cloned()
            .collect();
        rentals.sort_by_key(|r| r.due_date);
        Ok(rentals)
    }

    async fn find_overdue(&self, as_of: DateTime<Utc>) -> AppResult<Vec<Rental>> {
        let mut rentals: Vec<Rental> = self
            .state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .filter(|r| r.status == RentalStatus::InProgress && r.due_date < as_of)
            .cloned()
            .collect();
        rentals.sort_by_key(|r| r.due_date);
        Ok(rentals)
    }

    async fn count_active(&self) -> AppResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .filter(|r| r.status == RentalStatus::InProgress)
            .count() as i64)
    }

    async fn count_on_time(&self, due_soon_threshold: DateTime<Utc>) -> AppResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .filter(|r| r.status == RentalStatus::InProgress && r.due_date >= due_soon_threshold)
            .count() as i64)
    }

    async fn count_due_soon(
        &self,
        as_of: DateTime<Utc>,
        due_soon_threshold: DateTime<Utc>,
    ) -> AppResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .filter(|r| {
                r.status == RentalStatus::InProgress
                    && r.due_date >= as_of
                    && r.due_date < due_soon_threshold
            })
            .count() as i64)
    }

    async fn count_overdue(&self, as_of: DateTime<Utc>) -> AppResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .filter(|r| r.status == RentalStatus::InProgress && r.due_date < as_of)
            .count() as i64)
    }

    async fn count_by_user(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .filter(|r| r.user_id == user_id)
            .count() as i64)
    }

    async fn count_active_by_user(&self, user_id: Uuid) -> AppResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .filter(|r| r.user_id == user_id && r.status == RentalStatus::InProgress)
            .count() as i64)
    }

    async fn count_overdue_by_user(&self, user_id: Uuid, as_of: DateTime<Utc>) -> AppResult<i64> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rentals
            .iter()
            .filter(|r| {
                r.user_id == user_id
                    && r.status == RentalStatus::InProgress
                    && r.due_date < as_of
            })
            .count() as i64)
    }

    // Tally grouping lives in SQL; stats tests stub the repository trait
    // instead of going through the store.
    async fn book_rental_counts(
        &self,
        _category_id: Option<Uuid>,
    ) -> AppResult<Vec<BookRentalCounts>> {
        Ok(Vec::new())
    }

    async fn author_rental_counts(
        &self,
        _country_id: Option<Uuid>,
        _status: Option<AuthorStatus>,
    ) -> AppResult<Vec<AuthorRentalStats>> {
        Ok(Vec::new())
    }
}
