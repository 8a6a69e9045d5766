//! Author model (catalog store, read-only for the core)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Author activity status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum AuthorStatus {
    Active = 0,
    Inactive = 1,
}

impl From<i16> for AuthorStatus {
    fn from(v: i16) -> Self {
        match v {
            1 => AuthorStatus::Inactive,
            _ => AuthorStatus::Active,
        }
    }
}

impl From<AuthorStatus> for i16 {
    fn from(s: AuthorStatus) -> Self {
        s as i16
    }
}

/// Author model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Author {
    pub author_id: Uuid,
    pub full_name: String,
    pub pseudonym: Option<String>,
    pub photo_url: Option<String>,
    pub country_id: Option<Uuid>,
    pub status: AuthorStatus,
    pub created_at: DateTime<Utc>,
}
