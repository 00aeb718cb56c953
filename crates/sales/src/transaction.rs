//! Committed sale records.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use goldline_core::{
    Conflict, DomainError, DomainResult, ItemId, Money, ReturnId, TransactionId, checked_sum,
};
use goldline_inventory::ItemDetails;
use goldline_parties::CustomerRef;
use goldline_pricing::{Currency, PriceQuote};

use crate::draft::DraftLine;
use crate::payment::{ReferenceNumber, ValidatedPayment};
use crate::returns::ReturnRecord;

/// Snapshot of one sold item at sale time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    pub item_id: ItemId,
    pub item: ItemDetails,
    pub quote: PriceQuote,
    /// Set once the line has been reversed.
    #[serde(default)]
    pub returned_by: Option<ReturnId>,
}

impl SaleLine {
    /// Snapshot a draft line against the item attributes read at commit time.
    pub fn snapshot(line: &DraftLine, current: &ItemDetails) -> Self {
        Self {
            item_id: line.item_id,
            item: current.clone(),
            quote: line.quote.clone(),
            returned_by: None,
        }
    }

    pub fn amount(&self) -> Money {
        self.quote.amount
    }

    pub fn is_returned(&self) -> bool {
        self.returned_by.is_some()
    }
}

/// Financial totals fixed at commit.
///
/// `paid + remaining_balance == gross - discount` always holds; tendered money
/// above the net amount is reported as `change_due`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub gross: Money,
    pub discount: Money,
    pub paid: Money,
    pub remaining_balance: Money,
    pub change_due: Money,
}

impl SaleTotals {
    pub fn compute(gross: Money, discount: Money, tendered: Money) -> DomainResult<Self> {
        if discount < Decimal::ZERO || discount > gross {
            return Err(DomainError::validation(
                "discount",
                format!("discount must be within [0, {gross}]"),
            ));
        }
        let net = gross - discount;
        let tendered = tendered.max(Decimal::ZERO);
        let paid = tendered.min(net);

        Ok(Self {
            gross,
            discount,
            paid,
            remaining_balance: (net - paid).max(Decimal::ZERO),
            change_due: tendered - paid,
        })
    }

    pub fn net(&self) -> Money {
        self.gross - self.discount
    }
}

/// Durable sale record. Immutable apart from per-line return markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTransaction {
    pub id: TransactionId,
    pub customer: CustomerRef,
    pub lines: Vec<SaleLine>,
    pub reference: ReferenceNumber,
    pub currency: Currency,
    pub totals: SaleTotals,
    pub note: Option<String>,
    pub sale_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl SaleTransaction {
    /// Build a transaction from snapshotted lines. Totals are derived here and
    /// nowhere else.
    pub fn build(
        id: TransactionId,
        customer: CustomerRef,
        lines: Vec<SaleLine>,
        payment: &ValidatedPayment,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        customer.validate()?;
        let currency = match lines.first() {
            Some(first) => first.quote.currency,
            None => {
                return Err(DomainError::validation(
                    "lines",
                    "a sale needs at least one line",
                ));
            }
        };
        if let Some(other) = lines.iter().find(|l| l.quote.currency != currency) {
            return Err(Conflict::CurrencyMismatch {
                expected: currency.code().to_string(),
                found: other.quote.currency.code().to_string(),
            }
            .into());
        }
        for (i, line) in lines.iter().enumerate() {
            if lines[..i].iter().any(|l| l.item_id == line.item_id) {
                return Err(Conflict::DuplicateItem {
                    item_id: line.item_id,
                }
                .into());
            }
        }

        let gross = checked_sum(lines.iter().map(SaleLine::amount))
            .ok_or_else(|| DomainError::validation("lines", "sale total is out of range"))?;
        let totals = SaleTotals::compute(gross, payment.discount, payment.tendered)?;

        Ok(Self {
            id,
            customer,
            lines,
            reference: payment.reference,
            currency,
            totals,
            note: payment.note.clone(),
            sale_date: payment.sale_date,
            created_at,
        })
    }

    pub fn line(&self, item_id: ItemId) -> Option<&SaleLine> {
        self.lines.iter().find(|l| l.item_id == item_id)
    }

    pub fn item_ids(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.lines.iter().map(|l| l.item_id)
    }

    /// Lines that have not been reversed.
    pub fn open_lines(&self) -> impl Iterator<Item = &SaleLine> {
        self.lines.iter().filter(|l| !l.is_returned())
    }

    /// Decide a return of one line. Does not mutate the transaction.
    pub fn prepare_return(
        &self,
        item_id: ItemId,
        return_id: ReturnId,
        returned_at: DateTime<Utc>,
    ) -> DomainResult<ReturnRecord> {
        let line = self
            .line(item_id)
            .ok_or_else(|| DomainError::not_found("sale line", item_id))?;
        if line.is_returned() {
            return Err(Conflict::AlreadyReturned {
                transaction_id: self.id,
                item_id,
            }
            .into());
        }
        Ok(ReturnRecord {
            id: return_id,
            original_transaction_id: self.id,
            item_id,
            refund: line.clone(),
            returned_at,
        })
    }

    /// Record the reversal marker. Totals are left untouched.
    pub fn mark_returned(&mut self, record: &ReturnRecord) -> DomainResult<()> {
        if record.original_transaction_id != self.id {
            return Err(DomainError::validation(
                "transaction_id",
                "return record belongs to another transaction",
            ));
        }
        let id = self.id;
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.item_id == record.item_id)
            .ok_or_else(|| DomainError::not_found("sale line", record.item_id))?;
        if line.is_returned() {
            return Err(Conflict::AlreadyReturned {
                transaction_id: id,
                item_id: record.item_id,
            }
            .into());
        }
        line.returned_by = Some(record.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::tests::{fixed_quote, test_item};
    use goldline_core::CustomerId;
    use proptest::prelude::*;

    fn test_customer() -> CustomerRef {
        CustomerRef::new(CustomerId::new(), "Sara Ahmadi", "09120000000").unwrap()
    }

    fn test_payment(tendered: i64) -> ValidatedPayment {
        ValidatedPayment {
            reference: ReferenceNumber::new(1001).unwrap(),
            tendered: Decimal::from(tendered),
            discount: Decimal::ZERO,
            note: None,
            sale_date: NaiveDate::from_ymd_opt(2026, 3, 21).unwrap(),
        }
    }

    fn test_line(amount: i64) -> SaleLine {
        let item = test_item(&format!("L-{amount}"));
        SaleLine {
            item_id: item.id_typed(),
            item: item.details().unwrap().clone(),
            quote: fixed_quote(amount),
            returned_by: None,
        }
    }

    #[test]
    fn partial_payment_leaves_remaining_balance() {
        let tx = SaleTransaction::build(
            TransactionId::new(),
            test_customer(),
            vec![test_line(1000), test_line(2500)],
            &test_payment(2000),
            Utc::now(),
        )
        .unwrap();

        assert_eq!(
            tx.totals,
            SaleTotals {
                gross: Decimal::from(3500),
                discount: Decimal::ZERO,
                paid: Decimal::from(2000),
                remaining_balance: Decimal::from(1500),
                change_due: Decimal::ZERO,
            }
        );
        assert_eq!(tx.reference.value(), 1001);
    }

    #[test]
    fn sale_total_out_of_range_is_rejected() {
        let mut huge = test_line(1);
        huge.quote.amount = Decimal::MAX;
        let err = SaleTransaction::build(
            TransactionId::new(),
            test_customer(),
            vec![huge, test_line(2)],
            &test_payment(0),
            Utc::now(),
        )
        .unwrap_err();

        match err {
            DomainError::Validation { field: "lines", .. } => {}
            _ => panic!("Expected Validation error for lines"),
        }
    }

    #[test]
    fn over_tender_is_reported_as_change() {
        let totals = SaleTotals::compute(Decimal::from(3500), Decimal::ZERO, Decimal::from(4000)).unwrap();
        assert_eq!(totals.paid, Decimal::from(3500));
        assert_eq!(totals.remaining_balance, Decimal::ZERO);
        assert_eq!(totals.change_due, Decimal::from(500));
    }

    #[test]
    fn discount_outside_gross_is_rejected() {
        let err = SaleTotals::compute(Decimal::from(100), Decimal::from(101), Decimal::ZERO).unwrap_err();
        match err {
            DomainError::Validation { field: "discount", .. } => {}
            _ => panic!("Expected Validation error for discount"),
        }
    }

    #[test]
    fn empty_sale_is_rejected() {
        let err = SaleTransaction::build(
            TransactionId::new(),
            test_customer(),
            Vec::new(),
            &test_payment(0),
            Utc::now(),
        )
        .unwrap_err();
        match err {
            DomainError::Validation { field: "lines", .. } => {}
            _ => panic!("Expected Validation error for lines"),
        }
    }

    #[test]
    fn return_once_then_already_returned() {
        let mut tx = SaleTransaction::build(
            TransactionId::new(),
            test_customer(),
            vec![test_line(1000)],
            &test_payment(1000),
            Utc::now(),
        )
        .unwrap();
        let item_id = tx.lines[0].item_id;
        let totals_before = tx.totals;

        let record = tx.prepare_return(item_id, ReturnId::new(), Utc::now()).unwrap();
        assert_eq!(record.refund_amount(), Decimal::from(1000));
        tx.mark_returned(&record).unwrap();

        assert_eq!(tx.totals, totals_before);
        assert_eq!(tx.open_lines().count(), 0);

        match tx.prepare_return(item_id, ReturnId::new(), Utc::now()).unwrap_err() {
            DomainError::Conflict(Conflict::AlreadyReturned { item_id: id, .. }) => {
                assert_eq!(id, item_id)
            }
            _ => panic!("Expected AlreadyReturned conflict"),
        }
    }

    #[test]
    fn return_of_unknown_line_is_not_found() {
        let tx = SaleTransaction::build(
            TransactionId::new(),
            test_customer(),
            vec![test_line(1000)],
            &test_payment(0),
            Utc::now(),
        )
        .unwrap();

        match tx.prepare_return(ItemId::new(), ReturnId::new(), Utc::now()).unwrap_err() {
            DomainError::NotFound { entity: "sale line", .. } => {}
            _ => panic!("Expected NotFound error"),
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: paid + remaining always equals gross - discount, and
        /// nothing reported is negative.
        #[test]
        fn payment_is_never_misreported(
            gross_cents in 0i64..100_000_000i64,
            discount_pct in 0i64..=100i64,
            tendered_cents in -1_000_000i64..200_000_000i64,
        ) {
            let gross = Decimal::new(gross_cents, 2);
            let discount = (gross * Decimal::from(discount_pct) / Decimal::ONE_HUNDRED).round_dp(2);
            let tendered = Decimal::new(tendered_cents, 2);

            let t = SaleTotals::compute(gross, discount, tendered).unwrap();

            prop_assert_eq!(t.paid + t.remaining_balance, t.gross - t.discount);
            prop_assert!(t.paid >= Decimal::ZERO);
            prop_assert!(t.remaining_balance >= Decimal::ZERO);
            prop_assert!(t.change_due >= Decimal::ZERO);
            prop_assert_eq!(t.paid + t.change_due, tendered.max(Decimal::ZERO));
        }
    }
}
