use cqrs_es::DomainEvent;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::item::{LineItem, LineItemId};

/// Cart events. Wall-clock time travels in the envelope metadata
/// (`recorded_at`), so replaying the same commands yields equal events.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
#[serde(tag = "type")]
pub enum Event<D> {
    ItemAdded {
        item: LineItem<D>,
    },

    ItemRemoved {
        id: LineItemId,
        index: usize,
    },

    CartCleared,

    CommitStarted {
        idempotency_key: String,
    },

    CommitSucceeded {
        idempotency_key: String,
    },

    CommitFailed {
        idempotency_key: String,
        message: String,
    },
}

impl<D> DomainEvent for Event<D>
where
    D: Clone + std::fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync,
{
    fn event_type(&self) -> String {
        match self {
            Event::ItemAdded { .. } => "Cart:ItemAdded".to_string(),
            Event::ItemRemoved { .. } => "Cart:ItemRemoved".to_string(),
            Event::CartCleared => "Cart:Cleared".to_string(),
            Event::CommitStarted { .. } => "Cart:CommitStarted".to_string(),
            Event::CommitSucceeded { .. } => "Cart:CommitSucceeded".to_string(),
            Event::CommitFailed { .. } => "Cart:CommitFailed".to_string(),
        }
    }

    fn event_version(&self) -> String {
        "1.0".to_string()
    }
}
