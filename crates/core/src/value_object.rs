//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values. In
/// goldline the price quote attached to a draft line, the customer snapshot
/// frozen into a sale and an item barcode are all value objects: two quotes
/// with the same amount, currency and inputs are interchangeable.
///
/// To "change" a value object, build a new one (e.g. re-quote a line when the
/// market rate moves) instead of mutating it in place.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
