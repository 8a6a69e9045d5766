//! Domain models for the rental core

pub mod author;
pub mod book;
pub mod book_copy;
pub mod rental;
pub mod stats;
pub mod user;
