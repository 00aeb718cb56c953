//! Sales domain module.
//!
//! Draft orders, the checkout wizard, committed sale transactions and return
//! records. Pure domain logic; the atomic commit and reversal protocols that
//! persist these live in `goldline-infra`.

pub mod draft;
pub mod payment;
pub mod returns;
pub mod transaction;
pub mod wizard;

pub use draft::{CartSnapshot, DraftLine, DraftOrder, DraftTotals};
pub use payment::{PaymentFields, ReferenceNumber, ValidatedPayment};
pub use returns::ReturnRecord;
pub use transaction::{SaleLine, SaleTotals, SaleTransaction};
pub use wizard::{
    CheckoutWizard, CommitRequest, PersistedStep, ResumeOutcome, WizardSnapshot, WizardStep,
};
