//! Biblioteca rental core
//!
//! Library-management core for the Biblioteca web application: copy
//! inventory, the rental lifecycle ledger, usage statistics and the paging
//! helper shared by its listings. Presentation layers (server-rendered pages
//! and the REST API) call into [`services`] and never touch storage directly.

pub mod config;
pub mod error;
pub mod models;
pub mod paging;
pub mod repository;
pub mod services;

pub use config::{AppConfig, RentalConfig};
pub use error::{AppError, AppResult};
pub use paging::PagedResult;
