use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};

use goldline_core::{Conflict, ItemId, ReturnId, TransactionId};
use goldline_inventory::{Barcode, InventoryEvent, InventoryItem};
use goldline_sales::{ReferenceNumber, ReturnRecord, SaleTransaction};

use super::{Movement, SalesStore, StoreError, ledger_entries, return_item, sell_items};

#[derive(Debug, Default)]
struct State {
    items: HashMap<ItemId, InventoryItem>,
    barcodes: HashMap<Barcode, ItemId>,
    sales: HashMap<TransactionId, SaleTransaction>,
    references: HashMap<ReferenceNumber, TransactionId>,
    returns: HashMap<TransactionId, Vec<ReturnRecord>>,
    movements: HashMap<ItemId, Vec<Movement>>,
}

/// In-memory sales store.
///
/// Intended for tests/dev. A single write lock makes every write protocol
/// serializable; all checks run before the first mutation, so a failed
/// protocol leaves no trace.
#[derive(Debug, Default)]
pub struct InMemorySalesStore {
    state: RwLock<State>,
    offline: AtomicBool,
}

impl InMemorySalesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a backend outage: every call fails with `StoreError::Backend`
    /// until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store is offline".to_string()));
        }
        Ok(())
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, State>, StoreError> {
        self.ensure_online()?;
        self.state
            .read()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, State>, StoreError> {
        self.ensure_online()?;
        self.state
            .write()
            .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl SalesStore for InMemorySalesStore {
    async fn insert_item(
        &self,
        item: &InventoryItem,
        events: Vec<InventoryEvent>,
    ) -> Result<(), StoreError> {
        let details = item.details().ok_or_else(|| StoreError::NotFound {
            entity: "inventory item",
            id: item.id_typed().to_string(),
        })?;
        let mut state = self.write()?;

        let item_id = item.id_typed();
        if state.items.contains_key(&item_id) {
            return Err(StoreError::Conflict(Conflict::ItemAlreadyExists { item_id }));
        }
        if state.barcodes.contains_key(&details.barcode) {
            return Err(StoreError::Conflict(Conflict::DuplicateBarcode {
                barcode: details.barcode.to_string(),
            }));
        }

        state.barcodes.insert(details.barcode.clone(), item_id);
        state.items.insert(item_id, item.clone());
        state
            .movements
            .entry(item_id)
            .or_default()
            .extend(ledger_entries(item, events));
        Ok(())
    }

    async fn item(&self, item_id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        Ok(self.read()?.items.get(&item_id).cloned())
    }

    async fn item_by_barcode(&self, barcode: &Barcode) -> Result<Option<InventoryItem>, StoreError> {
        let state = self.read()?;
        Ok(state
            .barcodes
            .get(barcode)
            .and_then(|id| state.items.get(id))
            .cloned())
    }

    async fn commit_sale(&self, sale: SaleTransaction) -> Result<SaleTransaction, StoreError> {
        let mut state = self.write()?;

        if state.sales.contains_key(&sale.id) {
            return Err(StoreError::Backend(format!(
                "transaction {} already exists",
                sale.id
            )));
        }
        if state.references.contains_key(&sale.reference) {
            return Err(StoreError::Conflict(Conflict::DuplicateReference {
                reference: sale.reference.value(),
            }));
        }

        let current = sale
            .lines
            .iter()
            .map(|l| state.items.get(&l.item_id).cloned())
            .collect();
        let sold = sell_items(sale, current)?;

        for item in sold.items {
            state.items.insert(item.id_typed(), item);
        }
        for movement in sold.movements {
            let item_id = ItemId::from_uuid(movement.aggregate_id());
            state.movements.entry(item_id).or_default().push(movement);
        }
        state.references.insert(sold.sale.reference, sold.sale.id);
        state.sales.insert(sold.sale.id, sold.sale.clone());
        Ok(sold.sale)
    }

    async fn record_return(
        &self,
        transaction_id: TransactionId,
        item_id: ItemId,
        return_id: ReturnId,
        returned_at: DateTime<Utc>,
    ) -> Result<ReturnRecord, StoreError> {
        let mut state = self.write()?;

        let sale = state
            .sales
            .get(&transaction_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "sale transaction",
                id: transaction_id.to_string(),
            })?;
        let item = state.items.get(&item_id).cloned();
        let returned = return_item(sale, item, item_id, return_id, returned_at)?;

        state.items.insert(item_id, returned.item);
        state
            .movements
            .entry(item_id)
            .or_default()
            .extend(returned.movements);
        state.sales.insert(transaction_id, returned.sale);
        state
            .returns
            .entry(transaction_id)
            .or_default()
            .push(returned.record.clone());
        Ok(returned.record)
    }

    async fn transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<SaleTransaction>, StoreError> {
        Ok(self.read()?.sales.get(&transaction_id).cloned())
    }

    async fn find_by_reference(
        &self,
        reference: ReferenceNumber,
    ) -> Result<Option<SaleTransaction>, StoreError> {
        let state = self.read()?;
        Ok(state
            .references
            .get(&reference)
            .and_then(|id| state.sales.get(id))
            .cloned())
    }

    async fn returns_for(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<ReturnRecord>, StoreError> {
        Ok(self
            .read()?
            .returns
            .get(&transaction_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn movements(&self, item_id: ItemId) -> Result<Vec<Movement>, StoreError> {
        Ok(self
            .read()?
            .movements
            .get(&item_id)
            .cloned()
            .unwrap_or_default())
    }
}
