//! Postgres-backed sales store.
//!
//! ## Atomicity
//!
//! `commit_sale` and `record_return` each run in one transaction. Item rows are
//! locked with `SELECT ... FOR UPDATE` (in `item_id` order, so overlapping
//! commits cannot deadlock) before availability is checked, which makes two
//! concurrent commits over the same item serialize: the second one observes
//! `sold` and fails with `ItemNoLongerAvailable`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) on `reference_number` | `23505` | `Conflict(DuplicateReference)` |
//! | Database (unique violation) on `barcode` | `23505` | `Conflict(DuplicateBarcode)` |
//! | Database (unique violation) on `item_id` | `23505` | `Conflict(ItemAlreadyExists)` |
//! | Any other | any | `Backend` |

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::{Span, instrument};
use uuid::Uuid;

use goldline_core::{AggregateRoot, Conflict, ItemId, ReturnId, TransactionId};
use goldline_inventory::{Availability, Barcode, InventoryEvent, InventoryItem, ItemDetails};
use goldline_sales::{ReferenceNumber, ReturnRecord, SaleTransaction};

use super::{Movement, SalesStore, StoreError, ledger_entries, return_item, sell_items};

/// Tables used by [`PostgresSalesStore`]. Applied by [`PostgresSalesStore::ensure_schema`].
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS inventory_items (
    item_id       UUID PRIMARY KEY,
    barcode       TEXT NOT NULL UNIQUE,
    details       JSONB NOT NULL,
    availability  TEXT NOT NULL CHECK (availability IN ('available', 'sold')),
    received_at   TIMESTAMPTZ NOT NULL,
    version       BIGINT NOT NULL CHECK (version > 0)
);

CREATE TABLE IF NOT EXISTS sale_transactions (
    transaction_id    UUID PRIMARY KEY,
    reference_number  BIGINT NOT NULL UNIQUE CHECK (reference_number > 0),
    body              JSONB NOT NULL,
    created_at        TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS sale_returns (
    return_id       UUID PRIMARY KEY,
    transaction_id  UUID NOT NULL REFERENCES sale_transactions (transaction_id),
    item_id         UUID NOT NULL,
    body            JSONB NOT NULL,
    returned_at     TIMESTAMPTZ NOT NULL,
    UNIQUE (transaction_id, item_id)
);

CREATE TABLE IF NOT EXISTS inventory_movements (
    event_id         UUID PRIMARY KEY,
    item_id          UUID NOT NULL REFERENCES inventory_items (item_id),
    sequence_number  BIGINT NOT NULL,
    event_type       TEXT NOT NULL,
    occurred_at      TIMESTAMPTZ NOT NULL,
    envelope         JSONB NOT NULL,
    UNIQUE (item_id, sequence_number)
);
"#;

#[derive(Debug, Clone)]
pub struct PostgresSalesStore {
    pool: Arc<PgPool>,
}

impl PostgresSalesStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect and make sure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    async fn begin(&self) -> Result<Transaction<'_, Postgres>, StoreError> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

/// Lock the given item rows for the rest of the transaction.
async fn lock_items(
    tx: &mut Transaction<'_, Postgres>,
    item_ids: &[ItemId],
) -> Result<Vec<InventoryItem>, StoreError> {
    let ids: Vec<Uuid> = item_ids.iter().map(|id| *id.as_uuid()).collect();
    let rows = sqlx::query(
        r#"
        SELECT item_id, details, availability, received_at, version
        FROM inventory_items
        WHERE item_id = ANY($1)
        ORDER BY item_id
        FOR UPDATE
        "#,
    )
    .bind(&ids[..])
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("lock_items", e))?;

    rows.iter()
        .map(|row| {
            ItemRow::from_row(row)
                .map_err(|e| StoreError::Backend(format!("failed to read item row: {e}")))?
                .into_item()
        })
        .collect()
}

async fn update_item(
    tx: &mut Transaction<'_, Postgres>,
    item: &InventoryItem,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE inventory_items SET availability = $2, version = $3 WHERE item_id = $1",
    )
    .bind(item.id_typed().as_uuid())
    .bind(item.availability().as_str())
    .bind(item.version() as i64)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_item", e))?;
    Ok(())
}

async fn append_movements(
    tx: &mut Transaction<'_, Postgres>,
    movements: &[Movement],
) -> Result<(), StoreError> {
    for movement in movements {
        sqlx::query(
            r#"
            INSERT INTO inventory_movements (
                event_id, item_id, sequence_number, event_type, occurred_at, envelope
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(movement.event_id())
        .bind(movement.aggregate_id())
        .bind(movement.sequence_number() as i64)
        .bind(movement.event_type())
        .bind(movement.occurred_at())
        .bind(to_json(movement)?)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("append_movement", e))?;
    }
    Ok(())
}

async fn rollback(tx: Transaction<'_, Postgres>) -> Result<(), StoreError> {
    tx.rollback()
        .await
        .map_err(|e| map_sqlx_error("rollback", e))
}

#[async_trait::async_trait]
impl SalesStore for PostgresSalesStore {
    #[instrument(skip(self, item, events), fields(item_id = %item.id_typed()), err)]
    async fn insert_item(
        &self,
        item: &InventoryItem,
        events: Vec<InventoryEvent>,
    ) -> Result<(), StoreError> {
        let details = item.details().ok_or_else(|| StoreError::NotFound {
            entity: "inventory item",
            id: item.id_typed().to_string(),
        })?;
        let received_at = item.received_at().unwrap_or_else(Utc::now);
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO inventory_items (item_id, barcode, details, availability, received_at, version)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(item.id_typed().as_uuid())
        .bind(details.barcode.as_str())
        .bind(to_json(details)?)
        .bind(item.availability().as_str())
        .bind(received_at)
        .bind(item.version() as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(c) if c.contains("barcode") => StoreError::Conflict(Conflict::DuplicateBarcode {
                barcode: details.barcode.to_string(),
            }),
            Some(_) => StoreError::Conflict(Conflict::ItemAlreadyExists {
                item_id: item.id_typed(),
            }),
            None => map_sqlx_error("insert_item", e),
        })?;

        append_movements(&mut tx, &ledger_entries(item, events)).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    async fn item(&self, item_id: ItemId) -> Result<Option<InventoryItem>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT item_id, details, availability, received_at, version
            FROM inventory_items
            WHERE item_id = $1
            "#,
        )
        .bind(item_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("item", e))?;

        row.map(|row| {
            ItemRow::from_row(&row)
                .map_err(|e| StoreError::Backend(format!("failed to read item row: {e}")))?
                .into_item()
        })
        .transpose()
    }

    #[instrument(skip(self), fields(barcode = %barcode), err)]
    async fn item_by_barcode(&self, barcode: &Barcode) -> Result<Option<InventoryItem>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT item_id, details, availability, received_at, version
            FROM inventory_items
            WHERE barcode = $1
            "#,
        )
        .bind(barcode.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("item_by_barcode", e))?;

        row.map(|row| {
            ItemRow::from_row(&row)
                .map_err(|e| StoreError::Backend(format!("failed to read item row: {e}")))?
                .into_item()
        })
        .transpose()
    }

    #[instrument(
        skip(self, sale),
        fields(
            transaction_id = %sale.id,
            reference = %sale.reference,
            line_count = sale.lines.len(),
            committed_items = tracing::field::Empty
        ),
        err
    )]
    async fn commit_sale(&self, sale: SaleTransaction) -> Result<SaleTransaction, StoreError> {
        let mut tx = self.begin().await?;

        let item_ids: Vec<ItemId> = sale.item_ids().collect();
        let locked = lock_items(&mut tx, &item_ids).await?;
        let current = item_ids
            .iter()
            .map(|id| locked.iter().find(|i| i.id_typed() == *id).cloned())
            .collect();

        let sold = match sell_items(sale, current) {
            Ok(sold) => sold,
            Err(e) => {
                rollback(tx).await?;
                return Err(e);
            }
        };

        sqlx::query(
            r#"
            INSERT INTO sale_transactions (transaction_id, reference_number, body, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(sold.sale.id.as_uuid())
        .bind(sold.sale.reference.as_i64())
        .bind(to_json(&sold.sale)?)
        .bind(sold.sale.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(c) if c.contains("reference") => StoreError::Conflict(Conflict::DuplicateReference {
                reference: sold.sale.reference.value(),
            }),
            _ => map_sqlx_error("insert_sale", e),
        })?;

        for item in &sold.items {
            update_item(&mut tx, item).await?;
        }
        append_movements(&mut tx, &sold.movements).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Span::current().record("committed_items", sold.items.len());
        Ok(sold.sale)
    }

    #[instrument(
        skip(self, returned_at),
        fields(transaction_id = %transaction_id, item_id = %item_id, return_id = %return_id),
        err
    )]
    async fn record_return(
        &self,
        transaction_id: TransactionId,
        item_id: ItemId,
        return_id: ReturnId,
        returned_at: DateTime<Utc>,
    ) -> Result<ReturnRecord, StoreError> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(
            "SELECT body FROM sale_transactions WHERE transaction_id = $1 FOR UPDATE",
        )
        .bind(transaction_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_sale", e))?;
        let Some(row) = row else {
            rollback(tx).await?;
            return Err(StoreError::NotFound {
                entity: "sale transaction",
                id: transaction_id.to_string(),
            });
        };
        let sale: SaleTransaction = from_json(
            row.try_get("body")
                .map_err(|e| StoreError::Backend(format!("failed to read sale body: {e}")))?,
        )?;

        let item = lock_items(&mut tx, &[item_id]).await?.into_iter().next();
        let returned = match return_item(sale, item, item_id, return_id, returned_at) {
            Ok(returned) => returned,
            Err(e) => {
                rollback(tx).await?;
                return Err(e);
            }
        };

        sqlx::query(
            r#"
            INSERT INTO sale_returns (return_id, transaction_id, item_id, body, returned_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(return_id.as_uuid())
        .bind(transaction_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(to_json(&returned.record)?)
        .bind(returned_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => StoreError::Conflict(Conflict::AlreadyReturned {
                transaction_id,
                item_id,
            }),
            None => map_sqlx_error("insert_return", e),
        })?;

        sqlx::query("UPDATE sale_transactions SET body = $2 WHERE transaction_id = $1")
            .bind(transaction_id.as_uuid())
            .bind(to_json(&returned.sale)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("mark_line_returned", e))?;

        update_item(&mut tx, &returned.item).await?;
        append_movements(&mut tx, &returned.movements).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(returned.record)
    }

    #[instrument(skip(self), fields(transaction_id = %transaction_id), err)]
    async fn transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Option<SaleTransaction>, StoreError> {
        let row = sqlx::query("SELECT body FROM sale_transactions WHERE transaction_id = $1")
            .bind(transaction_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("transaction", e))?;
        row.map(|r| body_of(&r)).transpose()
    }

    #[instrument(skip(self), fields(reference = %reference), err)]
    async fn find_by_reference(
        &self,
        reference: ReferenceNumber,
    ) -> Result<Option<SaleTransaction>, StoreError> {
        let row = sqlx::query("SELECT body FROM sale_transactions WHERE reference_number = $1")
            .bind(reference.as_i64())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_reference", e))?;
        row.map(|r| body_of(&r)).transpose()
    }

    #[instrument(skip(self), fields(transaction_id = %transaction_id), err)]
    async fn returns_for(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<ReturnRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT body FROM sale_returns WHERE transaction_id = $1 ORDER BY returned_at ASC",
        )
        .bind(transaction_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("returns_for", e))?;
        rows.iter().map(body_of).collect()
    }

    #[instrument(skip(self), fields(item_id = %item_id), err)]
    async fn movements(&self, item_id: ItemId) -> Result<Vec<Movement>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT envelope AS body
            FROM inventory_movements
            WHERE item_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(item_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("movements", e))?;
        rows.iter().map(body_of).collect()
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value)
        .map_err(|e| StoreError::Backend(format!("serialization failed: {e}")))
}

fn from_json<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(value)
        .map_err(|e| StoreError::Backend(format!("deserialization failed: {e}")))
}

fn body_of<T: DeserializeOwned>(row: &sqlx::postgres::PgRow) -> Result<T, StoreError> {
    let body: serde_json::Value = row
        .try_get("body")
        .map_err(|e| StoreError::Backend(format!("failed to read body column: {e}")))?;
    from_json(body)
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::Backend(format!(
            "database error in {}: {} (code {})",
            operation,
            db_err.message(),
            db_err.code().as_deref().unwrap_or("unknown")
        )),
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Constraint name of a unique violation (`23505`), if `err` is one.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return Some(db_err.constraint().unwrap_or_default().to_string());
        }
    }
    None
}

// SQLx row types

#[derive(Debug)]
struct ItemRow {
    item_id: Uuid,
    details: serde_json::Value,
    availability: String,
    received_at: DateTime<Utc>,
    version: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for ItemRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            item_id: row.try_get("item_id")?,
            details: row.try_get("details")?,
            availability: row.try_get("availability")?,
            received_at: row.try_get("received_at")?,
            version: row.try_get("version")?,
        })
    }
}

impl ItemRow {
    fn into_item(self) -> Result<InventoryItem, StoreError> {
        let details: ItemDetails = from_json(self.details)?;
        let availability = Availability::parse(&self.availability)?;
        Ok(InventoryItem::rehydrate(
            ItemId::from_uuid(self.item_id),
            details,
            availability,
            self.received_at,
            self.version as u64,
        ))
    }
}
