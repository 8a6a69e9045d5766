//! Repository layer for database operations

pub mod book_copies;
pub mod books;
pub mod rentals;
pub mod users;

use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::{config::DatabaseConfig, error::AppResult};

pub use book_copies::BookCopyRepository;
pub use books::BookRepository;
pub use rentals::RentalRepository;
pub use users::UserRepository;

/// Open a Postgres pool with the configured connection bounds
pub async fn connect(config: &DatabaseConfig) -> AppResult<Pool<Postgres>> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}

/// Apply pending database migrations
pub async fn run_migrations(pool: &Pool<Postgres>) -> AppResult<()> {
    sqlx::migrate!().run(pool).await.map_err(sqlx::Error::from)?;
    Ok(())
}

/// Main repository struct holding one handle per aggregate.
///
/// The services only see the traits, so tests can swap in in-memory fakes
/// or mocks without a database.
#[derive(Clone)]
pub struct Repository {
    pub book_copies: Arc<dyn BookCopyRepository>,
    pub rentals: Arc<dyn RentalRepository>,
    pub books: Arc<dyn BookRepository>,
    pub users: Arc<dyn UserRepository>,
}

impl Repository {
    /// Create a repository backed by the given Postgres pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            book_copies: Arc::new(book_copies::PgBookCopyRepository::new(pool.clone())),
            rentals: Arc::new(rentals::PgRentalRepository::new(pool.clone())),
            books: Arc::new(books::PgBookRepository::new(pool.clone())),
            users: Arc::new(users::PgUserRepository::new(pool)),
        }
    }

    /// Assemble a repository from individual trait objects (test seam)
    pub fn from_parts(
        book_copies: Arc<dyn BookCopyRepository>,
        rentals: Arc<dyn RentalRepository>,
        books: Arc<dyn BookRepository>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        Self {
            book_copies,
            rentals,
            books,
            users,
        }
    }
}
