use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use goldline_core::{
    Aggregate, AggregateRoot, Conflict, DomainError, DomainResult, ItemId, Money, ReturnId,
    TransactionId, ValueObject,
};
use goldline_events::Event;

/// Highest purity a piece can carry (pure gold).
pub const MAX_KARAT: u32 = 24;

/// Aggregate type recorded on movement ledger envelopes.
pub const AGGREGATE_TYPE: &str = "inventory.item";

/// Unique, immutable barcode printed on the tag of a piece.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Barcode(String);

impl Barcode {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("barcode", "barcode cannot be empty"));
        }
        if !trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
        {
            return Err(DomainError::validation(
                "barcode",
                "barcode may only contain ASCII letters, digits and '-'",
            ));
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Barcode {}

impl TryFrom<String> for Barcode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Barcode::parse(&value)
    }
}

impl From<Barcode> for String {
    fn from(value: Barcode) -> Self {
        value.0
    }
}

impl core::fmt::Display for Barcode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Availability flag. Flipped only by commit (`Sold`) and return (`Available`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    Available,
    Sold,
}

impl Availability {
    pub fn as_str(self) -> &'static str {
        match self {
            Availability::Available => "available",
            Availability::Sold => "sold",
        }
    }

    pub fn parse(raw: &str) -> DomainResult<Self> {
        match raw {
            "available" => Ok(Availability::Available),
            "sold" => Ok(Availability::Sold),
            other => Err(DomainError::validation(
                "availability",
                format!("unknown availability '{other}'"),
            )),
        }
    }
}

/// Descriptive attributes fixed at purchase receipt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDetails {
    pub barcode: Barcode,
    pub name: String,
    pub category: String,
    /// Weight in grams.
    pub weight_grams: Decimal,
    /// Purity in karat (1..=24).
    pub purity_karat: Decimal,
    pub acquisition_cost: Money,
}

/// Aggregate root: InventoryItem (one uniquely priced piece).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryItem {
    id: ItemId,
    details: Option<ItemDetails>,
    availability: Availability,
    received_at: Option<DateTime<Utc>>,
    version: u64,
}

impl InventoryItem {
    /// Create an empty, not-yet-received aggregate instance.
    pub fn empty(id: ItemId) -> Self {
        Self {
            id,
            details: None,
            availability: Availability::Available,
            received_at: None,
            version: 0,
        }
    }

    /// Receive a new piece (purchase receipt), validating its attributes.
    pub fn receive(cmd: ReceiveItem) -> DomainResult<(Self, Vec<InventoryEvent>)> {
        let mut item = Self::empty(cmd.item_id);
        let events = item.execute(&InventoryCommand::ReceiveItem(cmd))?;
        Ok((item, events))
    }

    /// Rebuild an item from persisted state.
    pub fn rehydrate(
        id: ItemId,
        details: ItemDetails,
        availability: Availability,
        received_at: DateTime<Utc>,
        version: u64,
    ) -> Self {
        Self {
            id,
            details: Some(details),
            availability,
            received_at: Some(received_at),
            version,
        }
    }

    /// Handle a command and apply the resulting events.
    pub fn execute(&mut self, command: &InventoryCommand) -> DomainResult<Vec<InventoryEvent>> {
        let events = self.handle(command)?;
        for event in &events {
            self.apply(event);
        }
        Ok(events)
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    pub fn is_received(&self) -> bool {
        self.details.is_some()
    }

    pub fn details(&self) -> Option<&ItemDetails> {
        self.details.as_ref()
    }

    pub fn availability(&self) -> Availability {
        self.availability
    }

    pub fn is_available(&self) -> bool {
        self.is_received() && self.availability == Availability::Available
    }

    pub fn received_at(&self) -> Option<DateTime<Utc>> {
        self.received_at
    }
}

impl AggregateRoot for InventoryItem {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: ReceiveItem (purchase receipt).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveItem {
    pub item_id: ItemId,
    pub barcode: String,
    pub name: String,
    pub category: String,
    pub weight_grams: Decimal,
    pub purity_karat: Decimal,
    pub acquisition_cost: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkSold (issued by the commit protocol only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkSold {
    pub item_id: ItemId,
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkReturned (issued by the returns protocol only).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReturned {
    pub item_id: ItemId,
    pub transaction_id: TransactionId,
    pub return_id: ReturnId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    ReceiveItem(ReceiveItem),
    MarkSold(MarkSold),
    MarkReturned(MarkReturned),
}

/// Event: ItemReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReceived {
    pub item_id: ItemId,
    pub details: ItemDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemSold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSold {
    pub item_id: ItemId,
    pub transaction_id: TransactionId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemReturned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReturned {
    pub item_id: ItemId,
    pub transaction_id: TransactionId,
    pub return_id: ReturnId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InventoryEvent {
    ItemReceived(ItemReceived),
    ItemSold(ItemSold),
    ItemReturned(ItemReturned),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemReceived(_) => "inventory.item.received",
            InventoryEvent::ItemSold(_) => "inventory.item.sold",
            InventoryEvent::ItemReturned(_) => "inventory.item.returned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemReceived(e) => e.occurred_at,
            InventoryEvent::ItemSold(e) => e.occurred_at,
            InventoryEvent::ItemReturned(e) => e.occurred_at,
        }
    }
}

impl Aggregate for InventoryItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::ItemReceived(e) => {
                self.id = e.item_id;
                self.details = Some(e.details.clone());
                self.availability = Availability::Available;
                self.received_at = Some(e.occurred_at);
            }
            InventoryEvent::ItemSold(_) => {
                self.availability = Availability::Sold;
            }
            InventoryEvent::ItemReturned(_) => {
                self.availability = Availability::Available;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::ReceiveItem(cmd) => self.handle_receive(cmd),
            InventoryCommand::MarkSold(cmd) => self.handle_mark_sold(cmd),
            InventoryCommand::MarkReturned(cmd) => self.handle_mark_returned(cmd),
        }
    }
}

impl InventoryItem {
    fn ensure_item_id(&self, item_id: ItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::validation("item_id", "item_id mismatch"));
        }
        Ok(())
    }

    fn ensure_received(&self) -> Result<(), DomainError> {
        if !self.is_received() {
            return Err(DomainError::not_found("inventory item", self.id));
        }
        Ok(())
    }

    fn handle_receive(&self, cmd: &ReceiveItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.is_received() {
            return Err(Conflict::ItemAlreadyExists { item_id: cmd.item_id }.into());
        }
        self.ensure_item_id(cmd.item_id)?;

        let barcode = Barcode::parse(&cmd.barcode)?;
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name", "name cannot be empty"));
        }
        if cmd.weight_grams <= Decimal::ZERO {
            return Err(DomainError::validation("weight", "weight must be positive"));
        }
        if cmd.purity_karat <= Decimal::ZERO || cmd.purity_karat > Decimal::from(MAX_KARAT) {
            return Err(DomainError::validation(
                "purity",
                format!("purity must be within (0, {MAX_KARAT}] karat"),
            ));
        }
        if cmd.acquisition_cost < Decimal::ZERO {
            return Err(DomainError::validation(
                "acquisition_cost",
                "acquisition cost cannot be negative",
            ));
        }

        Ok(vec![InventoryEvent::ItemReceived(ItemReceived {
            item_id: cmd.item_id,
            details: ItemDetails {
                barcode,
                name: cmd.name.trim().to_string(),
                category: cmd.category.trim().to_string(),
                weight_grams: cmd.weight_grams,
                purity_karat: cmd.purity_karat,
                acquisition_cost: cmd.acquisition_cost,
            },
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_sold(&self, cmd: &MarkSold) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_received()?;
        self.ensure_item_id(cmd.item_id)?;

        if self.availability != Availability::Available {
            return Err(Conflict::ItemNoLongerAvailable { item_id: cmd.item_id }.into());
        }

        Ok(vec![InventoryEvent::ItemSold(ItemSold {
            item_id: cmd.item_id,
            transaction_id: cmd.transaction_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_returned(
        &self,
        cmd: &MarkReturned,
    ) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_received()?;
        self.ensure_item_id(cmd.item_id)?;

        if self.availability != Availability::Sold {
            return Err(Conflict::ItemNotSold { item_id: cmd.item_id }.into());
        }

        Ok(vec![InventoryEvent::ItemReturned(ItemReturned {
            item_id: cmd.item_id,
            transaction_id: cmd.transaction_id,
            return_id: cmd.return_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
