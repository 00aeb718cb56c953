//! `goldline-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by every goldline
//! module: typed identifiers, the error taxonomy, aggregate traits and money
//! helpers. No IO, no infrastructure concerns.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot};
pub use entity::Entity;
pub use error::{Conflict, Dependency, DomainError, DomainResult, ErrorKind};
pub use id::{CustomerId, ItemId, ReturnId, TransactionId};
pub use money::{Money, checked_sum, round_money};
pub use value_object::ValueObject;
