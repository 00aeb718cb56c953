//! Redis-backed session storage (optional).

use chrono::Duration;
use redis::Commands;

use super::{SessionError, SessionStorage};

#[derive(Debug, Clone)]
pub struct RedisSessionStorage {
    client: redis::Client,
}

impl RedisSessionStorage {
    pub fn new(redis_url: impl AsRef<str>) -> Result<Self, SessionError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(Self { client })
    }

    fn connection(&self) -> Result<redis::Connection, SessionError> {
        self.client
            .get_connection()
            .map_err(|e| SessionError::Backend(e.to_string()))
    }
}

impl SessionStorage for RedisSessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        let mut conn = self.connection()?;
        conn.get(key)
            .map_err(|e| SessionError::Backend(e.to_string()))
    }

    fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), SessionError> {
        // Redis rejects a zero expiry.
        let seconds = ttl.num_seconds().max(1);
        let mut conn = self.connection()?;
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(seconds)
            .query::<()>(&mut conn)
            .map_err(|e| SessionError::Backend(e.to_string()))
    }

    fn delete(&self, key: &str) -> Result<(), SessionError> {
        let mut conn = self.connection()?;
        let _: i64 = conn
            .del(key)
            .map_err(|e| SessionError::Backend(e.to_string()))?;
        Ok(())
    }
}
