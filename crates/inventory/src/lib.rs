//! Inventory domain module.
//!
//! Business rules for individually tagged jewelry pieces: purchase receipt and
//! the `available`/`sold` availability flag, implemented purely as
//! deterministic domain logic (no IO, no storage).

pub mod item;

pub use item::{
    AGGREGATE_TYPE, Availability, Barcode, InventoryCommand, InventoryEvent, InventoryItem,
    ItemDetails, ItemReceived, ItemReturned, ItemSold, MAX_KARAT, MarkReturned, MarkSold,
    ReceiveItem,
};
