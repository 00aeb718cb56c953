//! Draft order (cart): in-session collection of priced lines pending checkout.
//!
//! The draft holds no lock on its items. Availability is checked on
//! `add_line` as a courtesy and re-checked by the commit protocol.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use goldline_core::{Conflict, DomainError, DomainResult, ItemId, Money, checked_sum};
use goldline_inventory::{InventoryItem, ItemDetails};
use goldline_parties::CustomerRef;
use goldline_pricing::{Currency, PriceQuote};

use crate::payment::PaymentFields;

/// One (item, price) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftLine {
    pub item_id: ItemId,
    /// Item attributes as seen when the line was added (display only).
    pub item: ItemDetails,
    pub quote: PriceQuote,
}

/// Totals derived from the current lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftTotals {
    pub gross: Money,
    pub currency: Option<Currency>,
    pub line_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftOrder {
    lines: Vec<DraftLine>,
    customer: Option<CustomerRef>,
    payment: PaymentFields,
    created_at: DateTime<Utc>,
}

impl DraftOrder {
    pub fn new(created_at: DateTime<Utc>) -> Self {
        Self {
            lines: Vec::new(),
            customer: None,
            payment: PaymentFields::default(),
            created_at,
        }
    }

    pub fn lines(&self) -> &[DraftLine] {
        &self.lines
    }

    pub fn line(&self, item_id: ItemId) -> Option<&DraftLine> {
        self.lines.iter().find(|l| l.item_id == item_id)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn contains(&self, item_id: ItemId) -> bool {
        self.line(item_id).is_some()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn customer(&self) -> Option<&CustomerRef> {
        self.customer.as_ref()
    }

    pub fn payment(&self) -> &PaymentFields {
        &self.payment
    }

    /// Currency shared by all lines, if any.
    pub fn currency(&self) -> Option<Currency> {
        self.lines.first().map(|l| l.quote.currency)
    }

    /// Add a priced item.
    ///
    /// Fails with `DuplicateItem` if the item is already present, and
    /// `ItemUnavailable` if it is not currently `available`.
    pub fn add_line(&mut self, item: &InventoryItem, quote: PriceQuote) -> DomainResult<()> {
        let item_id = item.id_typed();
        if self.contains(item_id) {
            return Err(Conflict::DuplicateItem { item_id }.into());
        }
        let details = match item.details() {
            Some(details) if item.is_available() => details.clone(),
            _ => return Err(Conflict::ItemUnavailable { item_id }.into()),
        };
        if let Some(expected) = self.currency() {
            if expected != quote.currency {
                return Err(Conflict::CurrencyMismatch {
                    expected: expected.code().to_string(),
                    found: quote.currency.code().to_string(),
                }
                .into());
            }
        }

        let amounts = self.lines.iter().map(|l| l.quote.amount);
        if checked_sum(amounts.chain([quote.amount])).is_none() {
            return Err(gross_out_of_range());
        }

        self.lines.push(DraftLine {
            item_id,
            item: details,
            quote,
        });
        Ok(())
    }

    /// Replace the quote of an existing line (e.g. after a rate refresh).
    /// Returns `false` if the item is not in the draft.
    pub fn requote(&mut self, item_id: ItemId, quote: PriceQuote) -> DomainResult<bool> {
        let others_currency = self
            .lines
            .iter()
            .find(|l| l.item_id != item_id)
            .map(|l| l.quote.currency);
        if let Some(expected) = others_currency {
            if expected != quote.currency {
                return Err(Conflict::CurrencyMismatch {
                    expected: expected.code().to_string(),
                    found: quote.currency.code().to_string(),
                }
                .into());
            }
        }
        let amounts = self
            .lines
            .iter()
            .map(|l| if l.item_id == item_id { quote.amount } else { l.quote.amount });
        if checked_sum(amounts).is_none() {
            return Err(gross_out_of_range());
        }
        match self.lines.iter_mut().find(|l| l.item_id == item_id) {
            Some(line) => {
                line.quote = quote;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Idempotent removal. Returns the removed line, if it was present.
    pub fn remove_line(&mut self, item_id: ItemId) -> Option<DraftLine> {
        let idx = self.lines.iter().position(|l| l.item_id == item_id)?;
        Some(self.lines.remove(idx))
    }

    pub fn totals(&self) -> DraftTotals {
        DraftTotals {
            // add_line and requote keep the exact sum representable; a restored
            // cart is re-checked when the sale is built.
            gross: self
                .lines
                .iter()
                .fold(Decimal::ZERO, |acc, l| acc.saturating_add(l.quote.amount)),
            currency: self.currency(),
            line_count: self.lines.len(),
        }
    }

    pub fn bind_customer(&mut self, customer: CustomerRef) {
        self.customer = Some(customer);
    }

    pub fn unbind_customer(&mut self) {
        self.customer = None;
    }

    pub fn set_payment(&mut self, payment: PaymentFields) {
        self.payment = payment;
    }

    /// Empty the draft after commit or abandonment.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.customer = None;
        self.payment = PaymentFields::default();
    }

    /// Lines-only snapshot for the cart's own persistence.
    pub fn snapshot(&self, saved_at: DateTime<Utc>) -> CartSnapshot {
        CartSnapshot {
            lines: self.lines.clone(),
            created_at: self.created_at,
            saved_at,
        }
    }
}

fn gross_out_of_range() -> DomainError {
    DomainError::validation("amount", "order total is out of range")
}

/// Persisted cart. Customer and payment fields are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<DraftLine>,
    pub created_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}

impl CartSnapshot {
    /// A cart expires `max_age` after its creation.
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.created_at) > max_age
    }

    /// Rebuild the draft, or `None` if the cart has expired.
    pub fn restore(self, now: DateTime<Utc>, max_age: Duration) -> Option<DraftOrder> {
        if self.is_expired(now, max_age) {
            return None;
        }
        Some(DraftOrder {
            lines: self.lines,
            customer: None,
            payment: PaymentFields::default(),
            created_at: self.created_at,
        })
    }
}
