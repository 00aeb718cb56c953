use chrono::{DateTime, Utc};

/// A domain event: an immutable fact.
///
/// Inventory availability flips are recorded as events so the movement ledger
/// can always explain why an item is `sold` or `available`.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "inventory.item.sold").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
