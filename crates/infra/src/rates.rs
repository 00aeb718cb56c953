//! Market rate sources.

use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use goldline_core::{Dependency, DomainError};
use goldline_pricing::MarketRate;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateSourceError {
    #[error("rate source unreachable: {0}")]
    Unreachable(String),
}

impl From<RateSourceError> for DomainError {
    fn from(value: RateSourceError) -> Self {
        DomainError::dependency(Dependency::RateSource, value.to_string())
    }
}

/// Supplier of the current per-gram gold rate.
#[async_trait::async_trait]
pub trait MarketRateSource: Send + Sync {
    /// Latest published rate, or `None` if the source has nothing to offer.
    async fn latest_rate(&self) -> Result<Option<MarketRate>, RateSourceError>;
}

#[async_trait::async_trait]
impl<S> MarketRateSource for std::sync::Arc<S>
where
    S: MarketRateSource + ?Sized,
{
    async fn latest_rate(&self) -> Result<Option<MarketRate>, RateSourceError> {
        (**self).latest_rate().await
    }
}

/// Drop a rate that is older than `max_age`.
pub fn fresh_rate(
    rate: Option<MarketRate>,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Option<MarketRate> {
    match rate {
        Some(rate) if rate.is_stale(now, max_age) => {
            tracing::warn!(
                as_of = %rate.as_of,
                max_age_secs = max_age.num_seconds(),
                "discarding stale market rate"
            );
            None
        }
        other => other,
    }
}

/// Rate source holding a manually published rate.
///
/// Intended for tests/dev and for shops that type the daily rate in by hand.
#[derive(Debug, Default)]
pub struct InMemoryRateSource {
    rate: RwLock<Option<MarketRate>>,
}

impl InMemoryRateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rate(rate: MarketRate) -> Self {
        Self {
            rate: RwLock::new(Some(rate)),
        }
    }

    pub fn publish(&self, rate: MarketRate) -> Result<(), RateSourceError> {
        *self.slot()? = Some(rate);
        Ok(())
    }

    pub fn withdraw(&self) -> Result<(), RateSourceError> {
        *self.slot()? = None;
        Ok(())
    }

    fn slot(&self) -> Result<std::sync::RwLockWriteGuard<'_, Option<MarketRate>>, RateSourceError> {
        self.rate
            .write()
            .map_err(|_| RateSourceError::Unreachable("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl MarketRateSource for InMemoryRateSource {
    async fn latest_rate(&self) -> Result<Option<MarketRate>, RateSourceError> {
        self.rate
            .read()
            .map(|slot| slot.clone())
            .map_err(|_| RateSourceError::Unreachable("lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goldline_pricing::Currency;
    use rust_decimal::Decimal;

    fn test_rate(as_of: DateTime<Utc>) -> MarketRate {
        MarketRate {
            rate_per_gram: Decimal::from(3000),
            currency: Currency::Irr,
            as_of,
        }
    }

    #[test]
    fn stale_rates_are_dropped() {
        let now = Utc::now();
        assert!(fresh_rate(Some(test_rate(now - Duration::hours(2))), now, Duration::hours(1)).is_none());
        assert!(fresh_rate(Some(test_rate(now)), now, Duration::hours(1)).is_some());
        assert!(fresh_rate(None, now, Duration::hours(1)).is_none());
    }

    #[tokio::test]
    async fn published_rate_can_be_withdrawn() {
        let source = InMemoryRateSource::new();
        assert_eq!(source.latest_rate().await.unwrap(), None);

        source.publish(test_rate(Utc::now())).unwrap();
        assert!(source.latest_rate().await.unwrap().is_some());

        source.withdraw().unwrap();
        assert_eq!(source.latest_rate().await.unwrap(), None);
    }

    #[tokio::test]
    async fn poisoned_source_reports_writes_as_unreachable() {
        let source = std::sync::Arc::new(InMemoryRateSource::new());
        let holder = source.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.rate.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();

        match source.publish(test_rate(Utc::now())).unwrap_err() {
            RateSourceError::Unreachable(_) => {}
        }
        assert!(source.withdraw().is_err());
        assert!(source.latest_rate().await.is_err());
    }
}
