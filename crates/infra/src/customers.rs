//! Customer directory.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use goldline_core::{CustomerId, Dependency, DomainError};
use goldline_parties::Customer;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("customer directory unavailable: {0}")]
    Unavailable(String),
}

impl From<DirectoryError> for DomainError {
    fn from(value: DirectoryError) -> Self {
        DomainError::dependency(Dependency::CustomerDirectory, value.to_string())
    }
}

#[async_trait::async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Customers whose name or phone matches `query`.
    async fn search(&self, query: &str) -> Result<Vec<Customer>, DirectoryError>;

    async fn get(&self, customer_id: CustomerId) -> Result<Option<Customer>, DirectoryError>;
}

#[async_trait::async_trait]
impl<S> CustomerDirectory for std::sync::Arc<S>
where
    S: CustomerDirectory + ?Sized,
{
    async fn search(&self, query: &str) -> Result<Vec<Customer>, DirectoryError> {
        (**self).search(query).await
    }

    async fn get(&self, customer_id: CustomerId) -> Result<Option<Customer>, DirectoryError> {
        (**self).get(customer_id).await
    }
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCustomerDirectory {
    customers: RwLock<HashMap<CustomerId, Customer>>,
}

impl InMemoryCustomerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a customer record.
    pub fn upsert(&self, customer: Customer) -> Result<(), DirectoryError> {
        let mut map = self
            .customers
            .write()
            .map_err(|_| DirectoryError::Unavailable("lock poisoned".to_string()))?;
        map.insert(customer.id_typed(), customer);
        Ok(())
    }
}

#[async_trait::async_trait]
impl CustomerDirectory for InMemoryCustomerDirectory {
    async fn search(&self, query: &str) -> Result<Vec<Customer>, DirectoryError> {
        let map = self
            .customers
            .read()
            .map_err(|_| DirectoryError::Unavailable("lock poisoned".to_string()))?;
        let mut found: Vec<Customer> = map.values().filter(|c| c.matches(query)).cloned().collect();
        found.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(found)
    }

    async fn get(&self, customer_id: CustomerId) -> Result<Option<Customer>, DirectoryError> {
        let map = self
            .customers
            .read()
            .map_err(|_| DirectoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(map.get(&customer_id).cloned())
    }
}
