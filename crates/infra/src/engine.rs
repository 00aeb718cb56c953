//! Sales engine: pricing with live rates, the commit protocol and the
//! reversal protocol over a `SalesStore`.
//!
//! The engine is stateless apart from its collaborators. The atomic part of
//! each protocol lives in the store; the engine validates input, builds the
//! records to persist and updates the caller's draft order on success.

use chrono::{DateTime, Duration, Utc};
use tracing::{Span, info, instrument, warn};

use goldline_core::{Conflict, DomainError, DomainResult, ItemId, ReturnId, TransactionId};
use goldline_inventory::{Barcode, InventoryItem, ItemDetails, ReceiveItem};
use goldline_parties::CustomerRef;
use goldline_pricing::{MarketRate, PriceQuote, PricingConfig, PricingMode};
use goldline_sales::{
    DraftOrder, PaymentFields, ReferenceNumber, ReturnRecord, SaleLine, SaleTransaction,
    ValidatedPayment,
};

use crate::rates::{MarketRateSource, fresh_rate};
use crate::store::{Movement, SalesStore};

#[derive(Debug)]
pub struct SalesEngine<S, R> {
    store: S,
    rates: R,
    pricing: PricingConfig,
    rate_max_age: Duration,
}

impl<S, R> SalesEngine<S, R> {
    pub fn new(store: S, rates: R, pricing: PricingConfig, rate_max_age: Duration) -> Self {
        Self {
            store,
            rates,
            pricing,
            rate_max_age,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rates(&self) -> &R {
        &self.rates
    }

    pub fn pricing(&self) -> &PricingConfig {
        &self.pricing
    }
}

impl<S, R> SalesEngine<S, R>
where
    S: SalesStore,
    R: MarketRateSource,
{
    /// Current market rate, or `None` if the source has none or it is stale.
    pub async fn current_rate(&self) -> DomainResult<Option<MarketRate>> {
        let rate = self.rates.latest_rate().await?;
        Ok(fresh_rate(rate, Utc::now(), self.rate_max_age))
    }

    /// Price one item. An index-derived request without an explicit rate uses
    /// the source's current rate. A supplied rate is held to the same max age;
    /// a missing or stale rate is `RateUnavailable`.
    #[instrument(skip(self, item, mode), fields(barcode = %item.barcode), err)]
    pub async fn quote(&self, item: &ItemDetails, mode: PricingMode) -> DomainResult<PriceQuote> {
        let mode = match mode {
            PricingMode::IndexDerived {
                wage_per_gram,
                rate,
            } => {
                let rate = match rate {
                    Some(supplied) => fresh_rate(Some(supplied), Utc::now(), self.rate_max_age),
                    None => self.current_rate().await?,
                };
                PricingMode::IndexDerived {
                    wage_per_gram,
                    rate,
                }
            }
            fixed => fixed,
        };
        Ok(goldline_pricing::quote(item, &mode, &self.pricing)?)
    }

    /// Load a received item and price it.
    pub async fn quote_item(
        &self,
        item_id: ItemId,
        mode: PricingMode,
    ) -> DomainResult<(InventoryItem, PriceQuote)> {
        let item = self.item(item_id).await?;
        let details = item
            .details()
            .ok_or_else(|| DomainError::not_found("inventory item", item_id))?;
        let quote = self.quote(details, mode).await?;
        Ok((item, quote))
    }

    /// Register a purchased piece as available stock.
    #[instrument(skip(self, cmd), fields(item_id = %cmd.item_id), err)]
    pub async fn receive_item(&self, cmd: ReceiveItem) -> DomainResult<InventoryItem> {
        let (item, events) = InventoryItem::receive(cmd)?;
        self.store.insert_item(&item, events).await?;
        info!("item received");
        Ok(item)
    }

    pub async fn item(&self, item_id: ItemId) -> DomainResult<InventoryItem> {
        self.store
            .item(item_id)
            .await?
            .ok_or_else(|| DomainError::not_found("inventory item", item_id))
    }

    pub async fn item_by_barcode(&self, raw: &str) -> DomainResult<InventoryItem> {
        let barcode = Barcode::parse(raw)?;
        self.store
            .item_by_barcode(&barcode)
            .await?
            .ok_or_else(|| DomainError::not_found("inventory item", barcode))
    }

    /// Commit `draft` as a sale.
    ///
    /// On success the draft is cleared and the stored transaction returned. On
    /// any error nothing is written and the draft is left as it was.
    pub async fn commit(
        &self,
        draft: &mut DraftOrder,
        customer: &CustomerRef,
        payment: &PaymentFields,
    ) -> DomainResult<SaleTransaction> {
        let now = Utc::now();
        let validated = payment.validate(now.date_naive())?;
        self.commit_validated(draft, customer, &validated, now).await
    }

    /// Commit with payment fields that were already validated (the wizard's
    /// payment step applies the stricter checkout rules).
    #[instrument(
        skip(self, draft, customer, payment, now),
        fields(reference = %payment.reference, line_count = draft.lines().len(), transaction_id),
        err
    )]
    pub async fn commit_validated(
        &self,
        draft: &mut DraftOrder,
        customer: &CustomerRef,
        payment: &ValidatedPayment,
        now: DateTime<Utc>,
    ) -> DomainResult<SaleTransaction> {
        let lines = draft
            .lines()
            .iter()
            .map(|line| SaleLine::snapshot(line, &line.item))
            .collect();
        let sale = SaleTransaction::build(TransactionId::new(), customer.clone(), lines, payment, now)?;
        Span::current().record("transaction_id", tracing::field::display(sale.id));

        let stored = match self.store.commit_sale(sale).await {
            Ok(stored) => stored,
            Err(e) => {
                let err = DomainError::from(e);
                if let Some(conflict) = err.conflict() {
                    warn!(conflict = %conflict, "sale rejected");
                }
                return Err(err);
            }
        };

        draft.clear();
        info!(
            transaction_id = %stored.id,
            reference = %stored.reference,
            line_count = stored.lines.len(),
            gross = %stored.totals.gross,
            "sale committed"
        );
        Ok(stored)
    }

    /// Reverse one sold line of a committed transaction.
    #[instrument(skip(self), fields(return_id), err)]
    pub async fn reverse(
        &self,
        transaction_id: TransactionId,
        item_id: ItemId,
    ) -> DomainResult<ReturnRecord> {
        let return_id = ReturnId::new();
        Span::current().record("return_id", tracing::field::display(return_id));

        let record = self
            .store
            .record_return(transaction_id, item_id, return_id, Utc::now())
            .await
            .map_err(DomainError::from)
            .inspect_err(|err| {
                if let Some(Conflict::AlreadyReturned { .. }) = err.conflict() {
                    warn!("line already returned");
                }
            })?;

        info!(refund = %record.refund_amount(), "line returned");
        Ok(record)
    }

    pub async fn transaction(&self, transaction_id: TransactionId) -> DomainResult<SaleTransaction> {
        self.store
            .transaction(transaction_id)
            .await?
            .ok_or_else(|| DomainError::not_found("sale transaction", transaction_id))
    }

    /// Lookup for safe retry after an ambiguous commit outcome.
    pub async fn find_by_reference(
        &self,
        reference: ReferenceNumber,
    ) -> DomainResult<Option<SaleTransaction>> {
        Ok(self.store.find_by_reference(reference).await?)
    }

    pub async fn returns_for(&self, transaction_id: TransactionId) -> DomainResult<Vec<ReturnRecord>> {
        Ok(self.store.returns_for(transaction_id).await?)
    }

    pub async fn movements(&self, item_id: ItemId) -> DomainResult<Vec<Movement>> {
        Ok(self.store.movements(item_id).await?)
    }
}
