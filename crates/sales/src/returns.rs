use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use goldline_core::{ItemId, Money, ReturnId, TransactionId};

use crate::transaction::SaleLine;

/// Reversal of exactly one sold line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRecord {
    pub id: ReturnId,
    pub original_transaction_id: TransactionId,
    pub item_id: ItemId,
    /// The reversed line as it was sold.
    pub refund: SaleLine,
    pub returned_at: DateTime<Utc>,
}

impl ReturnRecord {
    pub fn refund_amount(&self) -> Money {
        self.refund.amount()
    }
}
