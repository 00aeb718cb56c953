use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Event;

/// Envelope for a recorded event, containing stream metadata.
///
/// This is the unit appended to the inventory movement ledger.
/// `sequence_number` is monotonically increasing per aggregate stream and
/// starts at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    aggregate_id: Uuid,
    aggregate_type: String,
    sequence_number: u64,
    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, copying its metadata.
    pub fn record(
        aggregate_id: Uuid,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            sequence_number,
            event_type: payload.event_type().to_string(),
            event_version: payload.version(),
            occurred_at: payload.occurred_at(),
            payload,
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn aggregate_id(&self) -> Uuid {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Tagged {
        at: DateTime<Utc>,
    }

    impl Event for Tagged {
        fn event_type(&self) -> &'static str {
            "test.tagged"
        }

        fn version(&self) -> u32 {
            2
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn record_copies_event_metadata() {
        let at = Utc::now();
        let aggregate_id = Uuid::now_v7();
        let env = EventEnvelope::record(aggregate_id, "test.aggregate", 3, Tagged { at });

        assert_eq!(env.aggregate_id(), aggregate_id);
        assert_eq!(env.aggregate_type(), "test.aggregate");
        assert_eq!(env.sequence_number(), 3);
        assert_eq!(env.event_type(), "test.tagged");
        assert_eq!(env.event_version(), 2);
        assert_eq!(env.occurred_at(), at);
    }

    #[test]
    fn envelope_survives_json_round_trip() {
        let env = EventEnvelope::record(Uuid::now_v7(), "test.aggregate", 1, Tagged { at: Utc::now() });
        let json = serde_json::to_string(&env).unwrap();
        let back: EventEnvelope<Tagged> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
