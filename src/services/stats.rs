//! Statistics service: rental leaderboards and trend reports.
//!
//! The repositories hand back raw grouped tallies; ordering, truncation
//! and the derived percentages all live here so the reports stay
//! deterministic for equal counts.

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        author::AuthorStatus,
        stats::{AuthorRentalStats, BookMostRequested, BookRentalCounts, BookRentalStats},
    },
    paging::{to_storage_index, PagedResult},
    repository::Repository,
};

/// Largest page the report endpoints will serve.
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
}

impl StatsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// The most-rented books, highest count first, titles breaking ties.
    pub async fn top_requested_books(&self, limit: i64) -> AppResult<Vec<BookRentalStats>> {
        let mut counts = self.repository.rentals.book_rental_counts(None).await?;
        sort_by_rentals(&mut counts);
        counts.truncate(limit.max(0) as usize);
        Ok(counts.into_iter().map(BookRentalStats::from).collect())
    }

    /// Paged most-requested report with day-over-day trend and popularity.
    ///
    /// Popularity is relative to the most-rented book on the returned page,
    /// so the page leader always reads 100%.
    pub async fn most_requested_books(
        &self,
        page: i64,
        page_size: i64,
        category_id: Option<Uuid>,
    ) -> AppResult<PagedResult<BookMostRequested>> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);

        let mut counts = self
            .repository
            .rentals
            .book_rental_counts(category_id)
            .await?;
        sort_by_rentals(&mut counts);

        let total = counts.len() as i64;
        let offset = (to_storage_index(page) * page_size) as usize;
        let page_counts: Vec<BookRentalCounts> = counts
            .into_iter()
            .skip(offset)
            .take(page_size as usize)
            .collect();

        let page_max = page_counts
            .iter()
            .map(|c| c.total_rentals)
            .max()
            .unwrap_or(0);
        let items = page_counts
            .into_iter()
            .map(|c| BookMostRequested::from_counts(c, page_max))
            .collect();
        Ok(PagedResult::new(items, page, page_size, total))
    }

    /// The most-rented authors, highest count first, names breaking ties.
    /// Authors without a single rental never appear.
    pub async fn top_requested_authors(
        &self,
        country_id: Option<Uuid>,
        status: Option<AuthorStatus>,
        limit: i64,
    ) -> AppResult<Vec<AuthorRentalStats>> {
        let mut authors = self
            .repository
            .rentals
            .author_rental_counts(country_id, status)
            .await?;
        authors.retain(|a| a.total_rentals > 0);
        authors.sort_by(|a, b| {
            b.total_rentals
                .cmp(&a.total_rentals)
                .then_with(|| a.full_name.cmp(&b.full_name))
        });
        authors.truncate(limit.max(0) as usize);
        Ok(authors)
    }
}

fn sort_by_rentals(counts: &mut [BookRentalCounts]) {
    counts.sort_by(|a, b| {
        b.total_rentals
            .cmp(&a.total_rentals)
            .then_with(|| a.title.cmp(&b.title))
    });
}
