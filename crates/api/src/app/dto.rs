use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use goldline_core::{ItemId, Money};
use goldline_inventory::{Availability, InventoryItem, ItemDetails};
use goldline_parties::CustomerRef;
use goldline_pricing::{Currency, PriceQuote, PricingMode};
use goldline_sales::PaymentFields;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ReceiveItemRequest {
    pub barcode: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub weight_grams: Decimal,
    pub purity_karat: Decimal,
    pub acquisition_cost: Money,
}

#[derive(Debug, Deserialize)]
pub struct BarcodeQuery {
    pub barcode: String,
}

#[derive(Debug, Deserialize)]
pub struct PublishRateRequest {
    pub rate_per_gram: Decimal,
    /// Defaults to the configured base currency.
    pub currency: Option<Currency>,
    /// Defaults to now.
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub item_id: ItemId,
    pub pricing: PricingMode,
}

#[derive(Debug, Deserialize)]
pub struct SaleLineRequest {
    pub item_id: ItemId,
    pub pricing: PricingMode,
}

#[derive(Debug, Deserialize)]
pub struct CommitSaleRequest {
    pub customer: CustomerRef,
    pub lines: Vec<SaleLineRequest>,
    #[serde(default)]
    pub payment: PaymentFields,
}

#[derive(Debug, Deserialize)]
pub struct SalesQuery {
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    pub item_id: ItemId,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ItemView {
    pub id: ItemId,
    pub availability: Availability,
    pub received_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub details: ItemDetails,
}

impl ItemView {
    pub fn from_item(item: &InventoryItem) -> Option<Self> {
        Some(Self {
            id: item.id_typed(),
            availability: item.availability(),
            received_at: item.received_at(),
            details: item.details()?.clone(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteResponse {
    pub item_id: ItemId,
    pub availability: Availability,
    #[serde(flatten)]
    pub quote: PriceQuote,
}
