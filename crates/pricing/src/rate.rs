use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::currency::Currency;

/// Per-gram gold price published by the market rate source.
///
/// `rate_per_gram` is quoted for metal of the configured reference purity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketRate {
    pub rate_per_gram: Decimal,
    pub currency: Currency,
    pub as_of: DateTime<Utc>,
}

impl MarketRate {
    /// A rate is stale once it is older than `max_age` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.as_of) > max_age
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_older_than_max_age_is_stale() {
        let now = Utc::now();
        let rate = MarketRate {
            rate_per_gram: Decimal::from(3000),
            currency: Currency::Irr,
            as_of: now - Duration::minutes(61),
        };
        assert!(rate.is_stale(now, Duration::hours(1)));
        assert!(!rate.is_stale(now, Duration::hours(2)));
    }
}
