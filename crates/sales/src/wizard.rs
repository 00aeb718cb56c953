//! Checkout wizard state machine.
//!
//! `ProductSelection -> CustomerInfo -> Payment -> Success`, with `Abandoned`
//! reachable from any non-terminal step. The wizard owns only the step and the
//! receipt; lines, customer and payment fields live on the [`DraftOrder`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use goldline_core::{Conflict, DomainError, DomainResult};
use goldline_parties::CustomerRef;

use crate::draft::DraftOrder;
use crate::payment::{PaymentFields, ValidatedPayment};
use crate::transaction::SaleTransaction;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardStep {
    ProductSelection,
    CustomerInfo,
    Payment,
    Success(Box<SaleTransaction>),
    Abandoned,
}

impl WizardStep {
    pub fn name(&self) -> &'static str {
        match self {
            WizardStep::ProductSelection => "product_selection",
            WizardStep::CustomerInfo => "customer_info",
            WizardStep::Payment => "payment",
            WizardStep::Success(_) => "success",
            WizardStep::Abandoned => "abandoned",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WizardStep::Success(_) | WizardStep::Abandoned)
    }
}

/// Steps a persisted session can resume at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistedStep {
    ProductSelection,
    CustomerInfo,
    Payment,
}

impl From<PersistedStep> for WizardStep {
    fn from(value: PersistedStep) -> Self {
        match value {
            PersistedStep::ProductSelection => WizardStep::ProductSelection,
            PersistedStep::CustomerInfo => WizardStep::CustomerInfo,
            PersistedStep::Payment => WizardStep::Payment,
        }
    }
}

/// Persisted `(step, customer, payment)` triple plus save time. Never holds
/// draft lines or the sale result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardSnapshot {
    pub step: PersistedStep,
    pub customer: Option<CustomerRef>,
    pub payment: PaymentFields,
    pub saved_at: DateTime<Utc>,
}

impl WizardSnapshot {
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.saved_at) > max_age
    }
}

/// How a wizard came back from persisted state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResumeOutcome {
    /// Nothing was persisted.
    Fresh,
    Restored,
    /// The snapshot was older than the max age and was discarded.
    Stale,
    /// The snapshot was restored but the cart was empty, so the step was reset.
    EmptyCart,
}

/// Everything the commit protocol needs, as checked by the payment step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub customer: CustomerRef,
    pub payment: ValidatedPayment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutWizard {
    step: WizardStep,
}

impl Default for CheckoutWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::ProductSelection,
        }
    }

    pub fn step(&self) -> &WizardStep {
        &self.step
    }

    pub fn receipt(&self) -> Option<&SaleTransaction> {
        match &self.step {
            WizardStep::Success(tx) => Some(tx.as_ref()),
            _ => None,
        }
    }

    fn invalid(&self, action: &'static str) -> DomainError {
        Conflict::InvalidTransition {
            step: self.step.name(),
            action,
        }
        .into()
    }

    /// Move forward from `ProductSelection` or `CustomerInfo`.
    ///
    /// Leaving `Payment` goes through [`Self::prepare_commit`] and
    /// [`Self::complete`] instead.
    pub fn next(&mut self, draft: &DraftOrder) -> DomainResult<&WizardStep> {
        let next = match &self.step {
            WizardStep::ProductSelection => {
                if draft.is_empty() {
                    return Err(DomainError::validation(
                        "lines",
                        "add at least one item before continuing",
                    ));
                }
                WizardStep::CustomerInfo
            }
            WizardStep::CustomerInfo => {
                let customer = draft.customer().ok_or_else(|| {
                    DomainError::validation("customer", "select a customer before continuing")
                })?;
                customer.validate()?;
                WizardStep::Payment
            }
            _ => return Err(self.invalid("advance")),
        };
        self.step = next;
        Ok(&self.step)
    }

    /// Step back one page. Later-step data is left untouched.
    pub fn back(&mut self) -> DomainResult<&WizardStep> {
        let prev = match &self.step {
            WizardStep::ProductSelection => WizardStep::ProductSelection,
            WizardStep::CustomerInfo => WizardStep::ProductSelection,
            WizardStep::Payment => WizardStep::CustomerInfo,
            _ => return Err(self.invalid("go back")),
        };
        self.step = prev;
        Ok(&self.step)
    }

    pub fn abandon(&mut self) -> DomainResult<()> {
        if self.step.is_terminal() {
            return Err(self.invalid("abandon"));
        }
        self.step = WizardStep::Abandoned;
        Ok(())
    }

    /// Payment guard: validates everything needed to commit, without
    /// changing step.
    pub fn prepare_commit(&self, draft: &DraftOrder, today: NaiveDate) -> DomainResult<CommitRequest> {
        if self.step != WizardStep::Payment {
            return Err(self.invalid("confirm payment"));
        }
        if draft.is_empty() {
            return Err(DomainError::validation("lines", "the draft order is empty"));
        }
        let customer = draft
            .customer()
            .cloned()
            .ok_or_else(|| DomainError::validation("customer", "no customer selected"))?;
        customer.validate()?;
        let payment = draft.payment().validate_for_checkout(today)?;

        Ok(CommitRequest { customer, payment })
    }

    /// Enter `Success` after a successful commit.
    pub fn complete(&mut self, receipt: SaleTransaction) -> DomainResult<()> {
        if self.step != WizardStep::Payment {
            return Err(self.invalid("complete"));
        }
        self.step = WizardStep::Success(Box::new(receipt));
        Ok(())
    }

    /// Snapshot for session storage. `None` once the wizard is terminal.
    pub fn snapshot(&self, draft: &DraftOrder, saved_at: DateTime<Utc>) -> Option<WizardSnapshot> {
        let step = match &self.step {
            WizardStep::ProductSelection => PersistedStep::ProductSelection,
            WizardStep::CustomerInfo => PersistedStep::CustomerInfo,
            WizardStep::Payment => PersistedStep::Payment,
            WizardStep::Success(_) | WizardStep::Abandoned => return None,
        };
        Some(WizardSnapshot {
            step,
            customer: draft.customer().cloned(),
            payment: draft.payment().clone(),
            saved_at,
        })
    }

    /// Rebuild a wizard from an optional snapshot, restoring customer and
    /// payment fields into `draft`. Draft lines come from the cart's own
    /// persistence and are never touched here.
    pub fn resume(
        snapshot: Option<WizardSnapshot>,
        now: DateTime<Utc>,
        max_age: Duration,
        draft: &mut DraftOrder,
    ) -> (Self, ResumeOutcome) {
        let Some(snapshot) = snapshot else {
            return (Self::new(), ResumeOutcome::Fresh);
        };
        if snapshot.is_stale(now, max_age) {
            return (Self::new(), ResumeOutcome::Stale);
        }

        match snapshot.customer {
            Some(customer) => draft.bind_customer(customer),
            None => draft.unbind_customer(),
        }
        draft.set_payment(snapshot.payment);

        if draft.is_empty() && snapshot.step != PersistedStep::ProductSelection {
            return (Self::new(), ResumeOutcome::EmptyCart);
        }
        (
            Self {
                step: snapshot.step.into(),
            },
            ResumeOutcome::Restored,
        )
    }
}
