//! Parties domain module.
//!
//! Customers as kept by the customer directory, and the self-contained
//! customer reference a checkout binds so that a committed sale survives later
//! edits to the directory record.

pub mod customer;

pub use customer::{ContactInfo, Customer, CustomerRef};
