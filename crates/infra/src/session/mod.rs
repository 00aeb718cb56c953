//! Per-terminal session persistence.
//!
//! Two independent records are kept per terminal: the wizard snapshot
//! (`step`, customer, payment fields) and the cart snapshot (draft lines).
//! Both are JSON values in a key/value store with TTL semantics. Storage is
//! single-device, last-write-wins.

mod debounce;
#[cfg(feature = "redis")]
mod redis_storage;

pub use debounce::Debouncer;
#[cfg(feature = "redis")]
pub use redis_storage::RedisSessionStorage;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use goldline_core::{Dependency, DomainError};
use goldline_sales::{CartSnapshot, WizardSnapshot};

use crate::config::AppConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session storage failure: {0}")]
    Backend(String),

    #[error("session serialization failure: {0}")]
    Serialize(String),
}

impl From<SessionError> for DomainError {
    fn from(value: SessionError) -> Self {
        DomainError::dependency(Dependency::SessionStorage, value.to_string())
    }
}

/// Key/value storage with per-key expiry.
pub trait SessionStorage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;

    /// Store `value`, expiring it after `ttl`.
    fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), SessionError>;

    fn delete(&self, key: &str) -> Result<(), SessionError>;
}

impl<S> SessionStorage for Arc<S>
where
    S: SessionStorage + ?Sized,
{
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), SessionError> {
        (**self).put(key, value, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), SessionError> {
        (**self).delete(key)
    }
}

/// In-memory session storage (tests/dev, or a single-process terminal).
#[derive(Debug, Default)]
pub struct InMemorySessionStorage {
    entries: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
}

impl InMemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for InMemorySessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| SessionError::Backend("lock poisoned".to_string()))?;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(value, _)| value.clone()))
    }

    fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), SessionError> {
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let mut entries = self
            .entries
            .write()
            .map_err(|_| SessionError::Backend("lock poisoned".to_string()))?;
        entries.insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), SessionError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| SessionError::Backend("lock poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Session storage selected by configuration: Redis when `redis_url` is set,
/// in memory otherwise.
pub fn storage_from_config(config: &AppConfig) -> Result<Arc<dyn SessionStorage>, SessionError> {
    match config.redis_url.as_deref() {
        #[cfg(feature = "redis")]
        Some(url) => {
            tracing::info!("checkout sessions stored in redis");
            Ok(Arc::new(RedisSessionStorage::new(url)?))
        }
        #[cfg(not(feature = "redis"))]
        Some(_) => Err(SessionError::Backend(
            "REDIS_URL is set but redis support is not compiled in".to_string(),
        )),
        None => {
            tracing::warn!("REDIS_URL not set, checkout sessions are kept in memory only");
            Ok(Arc::new(InMemorySessionStorage::new()))
        }
    }
}

/// Typed access to one terminal's wizard and cart snapshots.
#[derive(Debug, Clone)]
pub struct SessionRepository<S> {
    storage: S,
    terminal_id: String,
    max_age: Duration,
}

impl<S> SessionRepository<S>
where
    S: SessionStorage,
{
    pub fn new(storage: S, terminal_id: impl Into<String>, max_age: Duration) -> Self {
        Self {
            storage,
            terminal_id: terminal_id.into(),
            max_age,
        }
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    fn wizard_key(&self) -> String {
        format!("goldline:{}:wizard", self.terminal_id)
    }

    fn cart_key(&self) -> String {
        format!("goldline:{}:cart", self.terminal_id)
    }

    pub fn save_wizard(&self, snapshot: &WizardSnapshot) -> Result<(), SessionError> {
        self.put_json(&self.wizard_key(), snapshot)
    }

    pub fn load_wizard(&self) -> Result<Option<WizardSnapshot>, SessionError> {
        self.get_json(&self.wizard_key())
    }

    pub fn save_cart(&self, snapshot: &CartSnapshot) -> Result<(), SessionError> {
        self.put_json(&self.cart_key(), snapshot)
    }

    pub fn load_cart(&self) -> Result<Option<CartSnapshot>, SessionError> {
        self.get_json(&self.cart_key())
    }

    pub fn delete_wizard(&self) -> Result<(), SessionError> {
        self.storage.delete(&self.wizard_key())
    }

    /// Drop both snapshots.
    pub fn clear(&self) -> Result<(), SessionError> {
        self.storage.delete(&self.wizard_key())?;
        self.storage.delete(&self.cart_key())
    }

    fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), SessionError> {
        let json = serde_json::to_string(value).map_err(|e| SessionError::Serialize(e.to_string()))?;
        self.storage.put(key, json, self.max_age)
    }

    /// An unreadable record is discarded rather than failing the resume.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
        let Some(raw) = self.storage.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding unreadable session record");
                self.storage.delete(key)?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldline_sales::{PaymentFields, PersistedStep};

    fn test_snapshot() -> WizardSnapshot {
        WizardSnapshot {
            step: PersistedStep::CustomerInfo,
            customer: None,
            payment: PaymentFields {
                note: "engraving".to_string(),
                ..PaymentFields::default()
            },
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn configured_storage_defaults_to_memory() {
        let storage = storage_from_config(&AppConfig::default()).unwrap();
        let repo = SessionRepository::new(storage, "t0", Duration::hours(24));
        let snapshot = test_snapshot();

        repo.save_wizard(&snapshot).unwrap();
        assert_eq!(repo.load_wizard().unwrap(), Some(snapshot));
    }

    #[cfg(not(feature = "redis"))]
    #[test]
    fn redis_url_without_redis_support_is_an_error() {
        let config = AppConfig {
            redis_url: Some("redis://localhost:6379".to_string()),
            ..AppConfig::default()
        };
        match storage_from_config(&config) {
            Err(SessionError::Backend(message)) => assert!(message.contains("REDIS_URL")),
            _ => panic!("Expected Backend error"),
        }
    }

    #[test]
    fn wizard_and_cart_are_stored_independently() {
        let repo = SessionRepository::new(InMemorySessionStorage::new(), "t1", Duration::hours(24));
        let snapshot = test_snapshot();
        repo.save_wizard(&snapshot).unwrap();
        repo.save_cart(&CartSnapshot {
            lines: Vec::new(),
            created_at: Utc::now(),
            saved_at: Utc::now(),
        })
        .unwrap();

        repo.delete_wizard().unwrap();
        assert!(repo.load_wizard().unwrap().is_none());
        assert!(repo.load_cart().unwrap().is_some());

        repo.clear().unwrap();
        assert!(repo.load_cart().unwrap().is_none());
    }

    #[test]
    fn terminals_do_not_share_records() {
        let storage = Arc::new(InMemorySessionStorage::new());
        let a = SessionRepository::new(storage.clone(), "a", Duration::hours(24));
        let b = SessionRepository::new(storage, "b", Duration::hours(24));

        a.save_wizard(&test_snapshot()).unwrap();
        assert!(a.load_wizard().unwrap().is_some());
        assert!(b.load_wizard().unwrap().is_none());
    }

    #[test]
    fn expired_entries_are_not_returned() {
        let storage = InMemorySessionStorage::new();
        storage.put("k", "v".to_string(), Duration::seconds(-1)).unwrap();
        assert_eq!(storage.get("k").unwrap(), None);

        storage.put("k", "v".to_string(), Duration::hours(1)).unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn unreadable_record_is_dropped() {
        let storage = Arc::new(InMemorySessionStorage::new());
        storage
            .put("goldline:t1:wizard", "{not json".to_string(), Duration::hours(1))
            .unwrap();
        let repo = SessionRepository::new(storage.clone(), "t1", Duration::hours(24));

        assert!(repo.load_wizard().unwrap().is_none());
        assert_eq!(storage.get("goldline:t1:wizard").unwrap(), None);
    }
}
