use serde::{Deserialize, Serialize};

use super::item::{Candidate, LineItemId};

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub enum Command<D> {
    /// Append a validated candidate
    AddItem {
        id: LineItemId,
        candidate: Candidate<D>,
    },

    /// Remove by stable id
    RemoveItem {
        id: LineItemId,
    },

    /// Remove by display position
    RemoveAt {
        index: usize,
    },

    /// Operator abandoned the form
    Clear,

    /// Lock the cart for a commit request. The key is only used when the
    /// cart has none from a failed attempt.
    BeginCommit {
        idempotency_key: String,
    },

    /// Server accepted the batch
    CompleteCommit,

    /// Server or network rejected the batch
    FailCommit {
        message: String,
    },
}
