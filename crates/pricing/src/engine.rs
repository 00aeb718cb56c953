use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use goldline_core::{Money, round_money};
use goldline_inventory::ItemDetails;

use crate::currency::Currency;
use crate::error::PricingError;
use crate::rate::MarketRate;

/// Karat convention of the market rate source (rate quoted for 24k gold).
pub const DEFAULT_REFERENCE_PURITY: u32 = 24;

/// Static pricing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Purity (karat) the market rate is quoted for. Must match the rate source.
    pub reference_purity: Decimal,
    /// Currency of market rates and index-derived quotes.
    pub base_currency: Currency,
    pub supported_currencies: Vec<Currency>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            reference_purity: Decimal::from(DEFAULT_REFERENCE_PURITY),
            base_currency: Currency::Irr,
            supported_currencies: Currency::ALL.to_vec(),
        }
    }
}

impl PricingConfig {
    pub fn supports(&self, currency: Currency) -> bool {
        self.supported_currencies.contains(&currency)
    }
}

/// How a line is priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PricingMode {
    /// Operator-supplied amount; no computation.
    Fixed { amount: Money, currency: Currency },
    /// Gold index pricing. `rate` is `None` when the rate source had nothing current.
    IndexDerived {
        wage_per_gram: Option<Money>,
        rate: Option<MarketRate>,
    },
}

/// Inputs used for an index-derived quote, kept for display and audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexInputs {
    pub weight_grams: Decimal,
    pub purity_karat: Decimal,
    pub reference_purity: Decimal,
    pub rate_per_gram: Decimal,
    pub rate_as_of: DateTime<Utc>,
    pub wage_per_gram: Money,
    /// `weight * (purity / reference_purity) * rate_per_gram`, unrounded.
    pub base_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "basis", content = "inputs", rename_all = "snake_case")]
pub enum QuoteBasis {
    Fixed,
    IndexDerived(IndexInputs),
}

/// Line-scoped price. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub amount: Money,
    pub currency: Currency,
    pub basis: QuoteBasis,
}

impl PriceQuote {
    pub fn is_index_derived(&self) -> bool {
        matches!(self.basis, QuoteBasis::IndexDerived(_))
    }
}

/// Price one item.
pub fn quote(
    item: &ItemDetails,
    mode: &PricingMode,
    config: &PricingConfig,
) -> Result<PriceQuote, PricingError> {
    match mode {
        PricingMode::Fixed { amount, currency } => quote_fixed(*amount, *currency, config),
        PricingMode::IndexDerived {
            wage_per_gram,
            rate,
        } => quote_index(item, *wage_per_gram, rate.as_ref(), config),
    }
}

fn ensure_supported(currency: Currency, config: &PricingConfig) -> Result<(), PricingError> {
    if !config.supports(currency) {
        return Err(PricingError::UnsupportedCurrency {
            code: currency.code().to_string(),
        });
    }
    Ok(())
}

fn quote_fixed(
    amount: Money,
    currency: Currency,
    config: &PricingConfig,
) -> Result<PriceQuote, PricingError> {
    if amount <= Decimal::ZERO {
        return Err(PricingError::invalid("amount", "fixed amount must be positive"));
    }
    ensure_supported(currency, config)?;

    Ok(PriceQuote {
        amount: round_money(amount),
        currency,
        basis: QuoteBasis::Fixed,
    })
}

fn quote_index(
    item: &ItemDetails,
    wage_per_gram: Option<Money>,
    rate: Option<&MarketRate>,
    config: &PricingConfig,
) -> Result<PriceQuote, PricingError> {
    let weight = item.weight_grams;
    let purity = item.purity_karat;
    if weight <= Decimal::ZERO {
        return Err(PricingError::invalid("weight", "weight must be positive"));
    }
    if purity <= Decimal::ZERO {
        return Err(PricingError::invalid("purity", "purity must be positive"));
    }
    let wage = wage_per_gram.unwrap_or(Decimal::ZERO);
    if wage < Decimal::ZERO {
        return Err(PricingError::invalid("wage_per_gram", "wage cannot be negative"));
    }
    if config.reference_purity <= Decimal::ZERO {
        return Err(PricingError::invalid(
            "reference_purity",
            "reference purity must be positive",
        ));
    }

    let rate = rate.ok_or_else(|| PricingError::RateUnavailable {
        reason: "no current market rate".to_string(),
    })?;
    if rate.rate_per_gram <= Decimal::ZERO {
        return Err(PricingError::RateUnavailable {
            reason: format!("market rate {} is not positive", rate.rate_per_gram),
        });
    }
    ensure_supported(rate.currency, config)?;

    let out_of_range = || PricingError::invalid("amount", "index-derived price is out of range");
    let base_price = purity
        .checked_div(config.reference_purity)
        .and_then(|ratio| weight.checked_mul(ratio))
        .and_then(|fine| fine.checked_mul(rate.rate_per_gram))
        .ok_or_else(out_of_range)?;
    let suggested = weight
        .checked_mul(wage)
        .and_then(|labour| base_price.checked_add(labour))
        .ok_or_else(out_of_range)?;

    Ok(PriceQuote {
        amount: round_money(suggested),
        currency: rate.currency,
        basis: QuoteBasis::IndexDerived(IndexInputs {
            weight_grams: weight,
            purity_karat: purity,
            reference_purity: config.reference_purity,
            rate_per_gram: rate.rate_per_gram,
            rate_as_of: rate.as_of,
            wage_per_gram: wage,
            base_price,
        }),
    })
}
