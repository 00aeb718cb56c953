//! Pricing engine.
//!
//! Prices one inventory piece either from an operator-supplied fixed amount or
//! from the gold index (weight, purity and a live per-gram market rate).
//! Everything here is a pure function of its inputs.

pub mod currency;
pub mod engine;
pub mod error;
pub mod rate;

pub use currency::Currency;
pub use engine::{IndexInputs, PriceQuote, PricingConfig, PricingMode, QuoteBasis, quote};
pub use error::PricingError;
pub use rate::MarketRate;
