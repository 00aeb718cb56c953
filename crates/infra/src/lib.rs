//! Infrastructure layer: persistence, the commit/reverse protocols, external
//! collaborators, session storage and configuration.

pub mod config;
pub mod customers;
pub mod engine;
pub mod rates;
pub mod session;
pub mod store;
pub mod terminal;

pub use config::{AppConfig, ConfigError};
pub use customers::{CustomerDirectory, DirectoryError, InMemoryCustomerDirectory};
pub use engine::SalesEngine;
pub use rates::{InMemoryRateSource, MarketRateSource, RateSourceError};
pub use session::{
    Debouncer, InMemorySessionStorage, SessionError, SessionRepository, SessionStorage,
    storage_from_config,
};
pub use store::{InMemorySalesStore, Movement, PostgresSalesStore, SalesStore, StoreError};
pub use terminal::CheckoutTerminal;

#[cfg(test)]
mod integration_tests;
