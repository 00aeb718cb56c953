//! Payment fields as typed by the operator, and their validated form.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use goldline_core::{DomainError, DomainResult, Money};

/// Human-facing sale reference number (positive integer, unique per sale).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ReferenceNumber(u64);

impl ReferenceNumber {
    /// Largest accepted reference; stores keep it in a signed 64-bit column.
    pub const MAX: u64 = i64::MAX as u64;

    pub fn parse(raw: &str) -> DomainResult<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(DomainError::validation(
                "reference_number",
                "reference number is required",
            ));
        }
        if !raw.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::validation(
                "reference_number",
                "reference number must contain digits only",
            ));
        }
        let value: u64 = raw.parse().map_err(|_| {
            DomainError::validation("reference_number", "reference number is too large")
        })?;
        Self::new(value)
    }

    pub fn new(value: u64) -> DomainResult<Self> {
        if value == 0 {
            return Err(DomainError::validation(
                "reference_number",
                "reference number must be positive",
            ));
        }
        if value > Self::MAX {
            return Err(DomainError::validation(
                "reference_number",
                "reference number is too large",
            ));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u64 {
        self.0
    }

    /// Signed form for storage. `new` keeps the value within `i64`.
    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }
}

impl TryFrom<u64> for ReferenceNumber {
    type Error = DomainError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ReferenceNumber> for u64 {
    fn from(value: ReferenceNumber) -> Self {
        value.0
    }
}

impl core::fmt::Display for ReferenceNumber {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw payment step input. Kept verbatim across back-navigation and edits to
/// the draft order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFields {
    #[serde(default)]
    pub amount_tendered: Money,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub reference_number: String,
    /// `YYYY-MM-DD`; empty means the commit day.
    #[serde(default)]
    pub sale_date: String,
    /// Set only by adjustment workflows; the checkout never fills it.
    #[serde(default)]
    pub discount: Option<Money>,
}

/// Payment fields after validation, as consumed by the commit protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPayment {
    pub reference: ReferenceNumber,
    /// Tendered amount clamped at zero.
    pub tendered: Money,
    pub discount: Money,
    pub note: Option<String>,
    pub sale_date: NaiveDate,
}

impl PaymentFields {
    /// Validate for commit. A negative tendered amount is treated as nothing paid.
    pub fn validate(&self, today: NaiveDate) -> DomainResult<ValidatedPayment> {
        let reference = ReferenceNumber::parse(&self.reference_number)?;
        let sale_date = parse_sale_date(&self.sale_date, today)?;
        let discount = self.discount.unwrap_or(Decimal::ZERO);
        if discount < Decimal::ZERO {
            return Err(DomainError::validation("discount", "discount cannot be negative"));
        }
        let note = Some(self.note.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string);

        Ok(ValidatedPayment {
            reference,
            tendered: self.amount_tendered.max(Decimal::ZERO),
            discount,
            note,
            sale_date,
        })
    }

    /// Stricter check used by the checkout's payment step.
    pub fn validate_for_checkout(&self, today: NaiveDate) -> DomainResult<ValidatedPayment> {
        if self.amount_tendered < Decimal::ZERO {
            return Err(DomainError::validation(
                "amount_tendered",
                "tendered amount cannot be negative",
            ));
        }
        self.validate(today)
    }
}

fn parse_sale_date(raw: &str, today: NaiveDate) -> DomainResult<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(today);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| DomainError::validation("sale_date", format!("'{raw}' is not a YYYY-MM-DD date")))
}
