//! Single-operator checkout terminal.
//!
//! Owns one draft order and one wizard, prices scanned items through the
//! engine, looks customers up in the directory, and keeps the session store
//! up to date: the cart is saved on every line change, the wizard snapshot
//! through a debounced saver.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use goldline_core::{CustomerId, DomainError, DomainResult, ItemId};
use goldline_parties::{Customer, CustomerRef};
use goldline_pricing::PricingMode;
use goldline_sales::{
    CheckoutWizard, DraftLine, DraftOrder, PaymentFields, ResumeOutcome, SaleTransaction,
    WizardSnapshot, WizardStep,
};

use crate::config::AppConfig;
use crate::customers::CustomerDirectory;
use crate::engine::SalesEngine;
use crate::rates::MarketRateSource;
use crate::session::{Debouncer, SessionError, SessionRepository, SessionStorage};
use crate::store::SalesStore;

pub struct CheckoutTerminal<S, R, St, D> {
    engine: Arc<SalesEngine<S, R>>,
    directory: D,
    sessions: SessionRepository<St>,
    wizard: CheckoutWizard,
    draft: DraftOrder,
    saver: Debouncer<WizardSnapshot>,
}

impl<S, R, St, D> CheckoutTerminal<S, R, St, D>
where
    S: SalesStore,
    R: MarketRateSource,
    St: SessionStorage,
    D: CustomerDirectory,
{
    /// Resume the session of `terminal_id` with the configured max age and
    /// debounce window.
    pub fn open(
        engine: Arc<SalesEngine<S, R>>,
        directory: D,
        storage: St,
        terminal_id: impl Into<String>,
        config: &AppConfig,
        now: DateTime<Utc>,
    ) -> DomainResult<(Self, ResumeOutcome)> {
        let sessions = SessionRepository::new(storage, terminal_id, config.session_max_age);
        Self::resume(engine, directory, sessions, config.session_debounce, now)
    }

    /// Rebuild the terminal from persisted state.
    ///
    /// The cart and the wizard snapshot are restored independently; either may
    /// be missing or too old.
    pub fn resume(
        engine: Arc<SalesEngine<S, R>>,
        directory: D,
        sessions: SessionRepository<St>,
        debounce: Duration,
        now: DateTime<Utc>,
    ) -> DomainResult<(Self, ResumeOutcome)> {
        let max_age = sessions.max_age();

        let mut draft = match sessions.load_cart()? {
            Some(cart) => cart.restore(now, max_age).unwrap_or_else(|| {
                warn!("discarding expired cart");
                DraftOrder::new(now)
            }),
            None => DraftOrder::new(now),
        };

        let (wizard, outcome) = CheckoutWizard::resume(sessions.load_wizard()?, now, max_age, &mut draft);
        match outcome {
            ResumeOutcome::Stale => {
                warn!("discarding stale checkout session");
                sessions.delete_wizard()?;
            }
            ResumeOutcome::EmptyCart => warn!("cart is empty, checkout restarted at product selection"),
            ResumeOutcome::Restored => info!(step = wizard.step().name(), "checkout session restored"),
            ResumeOutcome::Fresh => {}
        }

        Ok((
            Self {
                engine,
                directory,
                sessions,
                wizard,
                draft,
                saver: Debouncer::new(debounce),
            },
            outcome,
        ))
    }

    pub fn step(&self) -> &WizardStep {
        self.wizard.step()
    }

    pub fn draft(&self) -> &DraftOrder {
        &self.draft
    }

    pub fn receipt(&self) -> Option<&SaleTransaction> {
        self.wizard.receipt()
    }

    /// Look an item up by barcode, price it and add it to the draft.
    pub async fn scan(&mut self, barcode: &str, mode: PricingMode) -> DomainResult<&DraftLine> {
        self.ensure_selecting()?;
        let item = self.engine.item_by_barcode(barcode).await?;
        let item_id = item.id_typed();
        let details = item
            .details()
            .ok_or_else(|| DomainError::not_found("inventory item", item_id))?;
        let quote = self.engine.quote(details, mode).await?;
        self.draft.add_line(&item, quote)?;
        self.save_cart();

        self.draft
            .line(item_id)
            .ok_or_else(|| DomainError::not_found("draft line", item_id))
    }

    /// Remove a line; removing an absent line is a no-op.
    pub fn remove(&mut self, item_id: ItemId) -> DomainResult<Option<DraftLine>> {
        self.ensure_selecting()?;
        let removed = self.draft.remove_line(item_id);
        if removed.is_some() {
            self.save_cart();
        }
        Ok(removed)
    }

    pub async fn search_customers(&self, query: &str) -> DomainResult<Vec<Customer>> {
        Ok(self.directory.search(query).await?)
    }

    /// Bind a directory customer. The checkout keeps its own copy of the
    /// name and phone; later directory edits do not reach it.
    pub async fn select_customer(&mut self, customer_id: CustomerId) -> DomainResult<&CustomerRef> {
        let customer = self
            .directory
            .get(customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", customer_id))?;
        self.bind_customer(CustomerRef::from_customer(&customer)?)?;
        self.draft
            .customer()
            .ok_or_else(|| DomainError::not_found("customer", customer_id))
    }

    pub fn bind_customer(&mut self, customer: CustomerRef) -> DomainResult<()> {
        customer.validate()?;
        self.draft.bind_customer(customer);
        self.schedule_save(Utc::now());
        Ok(())
    }

    /// Replace the payment fields verbatim. Validation happens on confirm.
    pub fn set_payment(&mut self, payment: PaymentFields) {
        self.draft.set_payment(payment);
        self.schedule_save(Utc::now());
    }

    pub fn next(&mut self) -> DomainResult<&WizardStep> {
        self.wizard.next(&self.draft)?;
        self.schedule_save(Utc::now());
        Ok(self.wizard.step())
    }

    pub fn back(&mut self) -> DomainResult<&WizardStep> {
        self.wizard.back()?;
        self.schedule_save(Utc::now());
        Ok(self.wizard.step())
    }

    /// Leave the checkout: the draft is cleared and the session dropped.
    pub fn abandon(&mut self) -> DomainResult<()> {
        self.wizard.abandon()?;
        self.draft.clear();
        self.saver.cancel();
        self.sessions.clear()?;
        Ok(())
    }

    /// Commit the draft from the payment step.
    ///
    /// On success the wizard moves to `Success` and the persisted session is
    /// deleted. On failure the wizard stays at `Payment` and the draft is kept;
    /// an `ItemNoLongerAvailable` conflict names the line to remove.
    pub async fn confirm(&mut self) -> DomainResult<&SaleTransaction> {
        let now = Utc::now();
        let request = self.wizard.prepare_commit(&self.draft, now.date_naive())?;
        let receipt = self
            .engine
            .commit_validated(&mut self.draft, &request.customer, &request.payment, now)
            .await?;

        self.wizard.complete(receipt)?;
        self.saver.cancel();
        if let Err(e) = self.sessions.clear() {
            warn!(error = %e, "failed to delete checkout session after commit");
        }
        self.wizard
            .receipt()
            .ok_or_else(|| DomainError::not_found("receipt", "current checkout"))
    }

    /// Persist the pending wizard snapshot once its debounce window is over.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<bool, SessionError> {
        match self.saver.poll(now) {
            Some(snapshot) => self.sessions.save_wizard(&snapshot).map(|_| true),
            None => Ok(false),
        }
    }

    /// Persist the pending wizard snapshot immediately.
    pub fn flush(&mut self) -> Result<(), SessionError> {
        match self.saver.flush() {
            Some(snapshot) => self.sessions.save_wizard(&snapshot),
            None => Ok(()),
        }
    }

    fn ensure_selecting(&self) -> DomainResult<()> {
        if *self.wizard.step() != WizardStep::ProductSelection {
            return Err(goldline_core::Conflict::InvalidTransition {
                step: self.wizard.step().name(),
                action: "edit lines",
            }
            .into());
        }
        Ok(())
    }

    fn schedule_save(&mut self, now: DateTime<Utc>) {
        if let Some(snapshot) = self.wizard.snapshot(&self.draft, now) {
            self.saver.schedule(snapshot, now);
        }
    }

    /// Cart saves are best-effort; a failing session store never blocks a sale.
    fn save_cart(&self) {
        let cart = self.draft.snapshot(Utc::now());
        if let Err(e) = self.sessions.save_cart(&cart) {
            warn!(error = %e, "failed to persist cart");
        }
    }
}
