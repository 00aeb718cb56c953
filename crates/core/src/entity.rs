//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Customers are entities: a customer keeps its identity while its name or
/// phone number is edited in the directory.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
