//! Persistent sales store.
//!
//! A `SalesStore` owns inventory items, committed sales, return records and the
//! inventory movement ledger. Both write protocols run as one atomic unit:
//!
//! - `commit_sale`: re-check every line's item is `available`, insert the sale,
//!   flip each item to `sold`, append ledger entries.
//! - `record_return`: check the line is sold and not yet returned, insert the
//!   return record, mark the line, flip the item back to `available`, append a
//!   ledger entry.
//!
//! The availability decision itself is made by the `InventoryItem` aggregate
//! (`MarkSold` / `MarkReturned`), executed inside the store's unit against the
//! freshly read (and, for Postgres, row-locked) state.

mod in_memory;
mod postgres;

pub use in_memory::InMemorySalesStore;
pub use postgres::PostgresSalesStore;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use goldline_core::{Conflict, Dependency, DomainError, ItemId, ReturnId, TransactionId};
use goldline_events::EventEnvelope;
use goldline_inventory::{
    AGGREGATE_TYPE, Barcode, InventoryCommand, InventoryEvent, InventoryItem, MarkReturned,
    MarkSold,
};
use goldline_sales::{ReferenceNumber, ReturnRecord, SaleTransaction};

/// Ledger entry for one inventory movement.
pub type Movement = EventEnvelope<InventoryEvent>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested change conflicts with current state. Nothing was written.
    #[error("conflict: {0}")]
    Conflict(Conflict),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Domain rule rejected the change. Nothing was written.
    #[error("rejected: {0}")]
    Rejected(DomainError),

    /// Backend failure (connection, lock poisoning, serialization).
    #[error("storage failure: {0}")]
    Backend(String),
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(c) => StoreError::Conflict(c),
            DomainError::NotFound { entity, id } => StoreError::NotFound { entity, id },
            other => StoreError::Rejected(other),
        }
    }
}

impl From<StoreError> for DomainError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(c) => DomainError::Conflict(c),
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            StoreError::Rejected(e) => e,
            StoreError::Backend(msg) => DomainError::dependency(Dependency::Store, msg),
        }
    }
}

#[async_trait::async_trait]
pub trait SalesStore: Send + Sync {
    /// Insert a freshly received item together with its `ItemReceived` entry.
    ///
    /// Fails with `ItemAlreadyExists` or `DuplicateBarcode`.
    async fn insert_item(
        &self,
        item: &InventoryItem,
        events: Vec<InventoryEvent>,
    ) -> Result<(), StoreError>;

    async fn item(&self, item_id: ItemId) -> Result<Option<InventoryItem>, StoreError>;

    async fn item_by_barcode(&self, barcode: &Barcode) -> Result<Option<InventoryItem>, StoreError>;

    /// Atomically re-check availability and persist the sale.
    ///
    /// Returns the stored transaction (line snapshots refreshed from the
    /// item rows read inside the unit). On any error nothing is written.
    async fn commit_sale(&self, sale: SaleTransaction) -> Result<SaleTransaction, StoreError>;

    /// Atomically reverse one sold line.
    async fn record_return(
        &self,
        transaction_id: TransactionId,
        item_id: ItemId,
        return_id: ReturnId,
        returned_at: DateTime<Utc>,
    ) -> Result<ReturnRecord, StoreError>;

    async fn transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<SaleTransaction>, StoreError>;

    async fn find_by_reference(
        &self,
        reference: ReferenceNumber,
    ) -> Result<Option<SaleTransaction>, StoreError>;

    async fn returns_for(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<ReturnRecord>, StoreError>;

    /// Ledger entries for one item in sequence order.
    async fn movements(&self, item_id: ItemId) -> Result<Vec<Movement>, StoreError>;
}

#[async_trait::async_trait]
impl<S> SalesStore for Arc<S>
where
    S: SalesStore + ?Sized,
{
    async fn insert_item(
        &self,
        item: &InventoryItem,
        events: Vec<InventoryEvent>,
    ) -> Result<(), StoreError> {
        (**self).insert_item(item, events).await
    }

    async fn item(&self, item_id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        (**self).item(item_id).await
    }

    async fn item_by_barcode(&self, barcode: &Barcode) -> Result<Option<InventoryItem>, StoreError> {
        (**self).item_by_barcode(barcode).await
    }

    async fn commit_sale(&self, sale: SaleTransaction) -> Result<SaleTransaction, StoreError> {
        (**self).commit_sale(sale).await
    }

    async fn record_return(
        &self,
        transaction_id: TransactionId,
        item_id: ItemId,
        return_id: ReturnId,
        returned_at: DateTime<Utc>,
    ) -> Result<ReturnRecord, StoreError> {
        (**self)
            .record_return(transaction_id, item_id, return_id, returned_at)
            .await
    }

    async fn transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<SaleTransaction>, StoreError> {
        (**self).transaction(transaction_id).await
    }

    async fn find_by_reference(
        &self,
        reference: ReferenceNumber,
    ) -> Result<Option<SaleTransaction>, StoreError> {
        (**self).find_by_reference(reference).await
    }

    async fn returns_for(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<ReturnRecord>, StoreError> {
        (**self).returns_for(transaction_id).await
    }

    async fn movements(&self, item_id: ItemId) -> Result<Vec<Movement>, StoreError> {
        (**self).movements(item_id).await
    }
}

/// Items after a sale decision, with the ledger entries to append.
pub(crate) struct SoldItems {
    pub sale: SaleTransaction,
    pub items: Vec<InventoryItem>,
    pub movements: Vec<Movement>,
}

/// Decide the availability flip for every line of `sale` against `current`
/// (the item rows read inside the store's atomic unit, in line order).
///
/// Any item that is no longer `available` fails the whole sale with
/// `ItemNoLongerAvailable`.
pub(crate) fn sell_items(
    mut sale: SaleTransaction,
    current: Vec<Option<InventoryItem>>,
) -> Result<SoldItems, StoreError> {
    let mut items = Vec::with_capacity(current.len());
    let mut movements = Vec::with_capacity(current.len());

    for (line, item) in sale.lines.iter_mut().zip(current) {
        let mut item = match item {
            Some(item) if item.is_received() => item,
            _ => {
                return Err(StoreError::NotFound {
                    entity: "inventory item",
                    id: line.item_id.to_string(),
                });
            }
        };
        let events = item.execute(&InventoryCommand::MarkSold(MarkSold {
            item_id: line.item_id,
            transaction_id: sale.id,
            occurred_at: sale.created_at,
        }))?;
        if let Some(details) = item.details() {
            line.item = details.clone();
        }
        movements.extend(ledger_entries(&item, events));
        items.push(item);
    }

    Ok(SoldItems {
        sale,
        items,
        movements,
    })
}

/// Item and ledger entry after a return decision.
pub(crate) struct ReturnedItem {
    pub record: ReturnRecord,
    pub sale: SaleTransaction,
    pub item: InventoryItem,
    pub movements: Vec<Movement>,
}

/// Decide a return of `item_id` from `sale` against the current item row.
pub(crate) fn return_item(
    mut sale: SaleTransaction,
    item: Option<InventoryItem>,
    item_id: ItemId,
    return_id: ReturnId,
    returned_at: DateTime<Utc>,
) -> Result<ReturnedItem, StoreError> {
    let record = sale.prepare_return(item_id, return_id, returned_at)?;
    let mut item = item.ok_or_else(|| StoreError::NotFound {
        entity: "inventory item",
        id: item_id.to_string(),
    })?;
    let events = item.execute(&InventoryCommand::MarkReturned(MarkReturned {
        item_id,
        transaction_id: sale.id,
        return_id,
        occurred_at: returned_at,
    }))?;
    sale.mark_returned(&record)?;

    Ok(ReturnedItem {
        movements: ledger_entries(&item, events),
        record,
        sale,
        item,
    })
}

/// Wrap freshly applied events as ledger entries. Sequence numbers follow the
/// item's version, which was bumped once per event.
pub(crate) fn ledger_entries(item: &InventoryItem, events: Vec<InventoryEvent>) -> Vec<Movement> {
    use goldline_core::AggregateRoot;

    let first = item.version() + 1 - events.len() as u64;
    events
        .into_iter()
        .enumerate()
        .map(|(i, e)| {
            EventEnvelope::record(
                *item.id_typed().as_uuid(),
                AGGREGATE_TYPE,
                first + i as u64,
                e,
            )
        })
        .collect()
}
