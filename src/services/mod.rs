//! Business logic services

pub mod inventory;
pub mod rentals;
pub mod stats;

#[cfg(test)]
pub(crate) mod support;

use crate::{config::RentalConfig, repository::Repository};

pub use inventory::InventoryService;
pub use rentals::RentalsService;
pub use stats::StatsService;

/// Main services struct holding one service per concern
#[derive(Clone)]
pub struct Services {
    pub inventory: InventoryService,
    pub rentals: RentalsService,
    pub stats: StatsService,
}

impl Services {
    /// Create services backed by the given repository
    pub fn new(repository: Repository, rental_config: RentalConfig) -> Self {
        Self {
            inventory: InventoryService::new(repository.clone()),
            rentals: RentalsService::new(repository.clone(), rental_config),
            stats: StatsService::new(repository),
        }
    }
}
