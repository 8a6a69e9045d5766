//! Usage statistics types and trend arithmetic

use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Direction of the yesterday-to-today rental trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Up,
    Down,
    Flat,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Flat => "flat",
        };
        write!(f, "{}", label)
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

impl Trend {
    /// Percentage change between yesterday's and today's rental counts,
    /// rounded to one decimal, with its direction. A book that only started
    /// renting today pins at +100%, trending up.
    pub fn from_counts(yesterday: i64, today: i64) -> (f64, Trend) {
        if yesterday == 0 && today == 0 {
            (0.0, Trend::Flat)
        } else if yesterday == 0 {
            (100.0, Trend::Up)
        } else {
            let change = (today - yesterday) as f64 / yesterday as f64 * 100.0;
            let direction = if change > 0.0 {
                Trend::Up
            } else if change < 0.0 {
                Trend::Down
            } else {
                Trend::Flat
            };
            (round1(change), direction)
        }
    }
}

/// Share of the page's most-rented book, rounded to one decimal.
pub fn popularity_percentage(total_rentals: i64, max_total_rentals: i64) -> f64 {
    if max_total_rentals == 0 {
        0.0
    } else {
        round1(total_rentals as f64 / max_total_rentals as f64 * 100.0)
    }
}

/// Raw per-book rental tallies from the ledger, ungrouped and unordered.
/// Yesterday/today are calendar days relative to the database clock.
#[derive(Debug, Clone, FromRow)]
pub struct BookRentalCounts {
    pub book_id: Uuid,
    pub title: String,
    pub isbn: Option<String>,
    pub author_name: String,
    pub category_name: String,
    pub total_rentals: i64,
    pub active_rentals: i64,
    pub yesterday_rentals: i64,
    pub today_rentals: i64,
}

/// Top-requested-books entry
#[derive(Debug, Clone, Serialize)]
pub struct BookRentalStats {
    pub book_id: Uuid,
    pub title: String,
    pub isbn: Option<String>,
    pub author_name: String,
    pub category_name: String,
    pub rental_count: i64,
    pub active_rentals: i64,
}

impl From<BookRentalCounts> for BookRentalStats {
    fn from(c: BookRentalCounts) -> Self {
        Self {
            book_id: c.book_id,
            title: c.title,
            isbn: c.isbn,
            author_name: c.author_name,
            category_name: c.category_name,
            rental_count: c.total_rentals,
            active_rentals: c.active_rentals,
        }
    }
}

/// Most-requested-books report entry with trend and popularity
#[derive(Debug, Clone, Serialize)]
pub struct BookMostRequested {
    pub book_id: Uuid,
    pub title: String,
    pub isbn: Option<String>,
    pub author_name: String,
    pub category_name: String,
    pub total_rentals: i64,
    pub yesterday_rentals: i64,
    pub today_rentals: i64,
    pub trend_percentage: f64,
    pub trend: Trend,
    /// Relative to the maximum rental count within the returned page.
    pub popularity_percentage: f64,
}

impl BookMostRequested {
    pub fn from_counts(c: BookRentalCounts, max_total_rentals: i64) -> Self {
        let (trend_percentage, trend) = Trend::from_counts(c.yesterday_rentals, c.today_rentals);
        Self {
            book_id: c.book_id,
            title: c.title,
            isbn: c.isbn,
            author_name: c.author_name,
            category_name: c.category_name,
            total_rentals: c.total_rentals,
            yesterday_rentals: c.yesterday_rentals,
            today_rentals: c.today_rentals,
            trend_percentage,
            trend,
            popularity_percentage: popularity_percentage(c.total_rentals, max_total_rentals),
        }
    }
}

/// Per-author rental tallies through the book/copy/rental joins
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuthorRentalStats {
    pub author_id: Uuid,
    pub full_name: String,
    pub pseudonym: Option<String>,
    pub photo_url: Option<String>,
    pub country_name: Option<String>,
    pub total_books: i64,
    pub total_copies: i64,
    pub available_copies: i64,
    pub total_rentals: i64,
}
