use std::{fmt, marker::PhantomData};

use async_trait::async_trait;
use cqrs_es::Aggregate;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{errors::RejectReason, workflows::Workflow};

use super::{
    item::{Candidate, LineItem},
    Command, Event,
};

/// Cart lifecycle status
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CartStatus {
    /// No items
    #[default]
    Empty,
    /// At least one item, editable
    Staging,
    /// Commit request in flight, every mutation is rejected
    Committing,
}

impl fmt::Display for CartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CartStatus::Empty => "empty",
            CartStatus::Staging => "staging",
            CartStatus::Committing => "committing",
        };
        f.write_str(s)
    }
}

pub const AGGREGATE_TYPE: &str = "StagingCart";

#[derive(Clone, Default)]
pub struct Services {}

/// Event-sourced state of one staging cart.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(bound(
    serialize = "W::Detail: Serialize",
    deserialize = "W::Detail: DeserializeOwned"
))]
pub struct CartState<W: Workflow> {
    pub items: Vec<LineItem<W::Detail>>,
    pub committing: bool,
    /// Set by `CommitStarted`, kept by `CommitFailed`, dropped by any change
    pub idempotency_key: Option<String>,
    #[serde(skip)]
    workflow: PhantomData<W>,
}

impl<W: Workflow> Default for CartState<W> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            committing: false,
            idempotency_key: None,
            workflow: PhantomData,
        }
    }
}

#[async_trait]
impl<W: Workflow> Aggregate for CartState<W> {
    type Command = Command<W::Detail>;
    type Event = Event<W::Detail>;
    type Error = RejectReason;
    type Services = Services;

    fn aggregate_type() -> String {
        format!("{}:{}", AGGREGATE_TYPE, W::NAME)
    }

    async fn handle(
        &self,
        command: Self::Command,
        _services: &Self::Services,
    ) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            Command::AddItem { id, candidate } => {
                self.validate_mutable()?;
                self.validate_candidate(&candidate)?;

                Ok(vec![Event::ItemAdded {
                    item: candidate.into_line_item(id),
                }])
            }

            Command::RemoveItem { id } => {
                self.validate_mutable()?;
                let index = self
                    .items
                    .iter()
                    .position(|item| item.id == id)
                    .ok_or_else(|| RejectReason::UnknownItem { id: id.to_string() })?;

                Ok(vec![Event::ItemRemoved { id, index }])
            }

            Command::RemoveAt { index } => {
                self.validate_mutable()?;
                let item = self.items.get(index).ok_or(RejectReason::IndexOutOfRange {
                    index,
                    len: self.items.len(),
                })?;

                Ok(vec![Event::ItemRemoved { id: item.id, index }])
            }

            Command::Clear => {
                self.validate_mutable()?;

                Ok(vec![Event::CartCleared])
            }

            Command::BeginCommit { idempotency_key } => {
                self.validate_mutable()?;
                if self.items.is_empty() {
                    return Err(RejectReason::EmptyCart);
                }

                Ok(vec![Event::CommitStarted {
                    idempotency_key: self.idempotency_key.clone().unwrap_or(idempotency_key),
                }])
            }

            Command::CompleteCommit => {
                let idempotency_key = self.validate_committing(CartStatus::Empty)?;

                Ok(vec![Event::CommitSucceeded { idempotency_key }])
            }

            Command::FailCommit { message } => {
                let idempotency_key = self.validate_committing(CartStatus::Staging)?;

                Ok(vec![Event::CommitFailed {
                    idempotency_key,
                    message,
                }])
            }
        }
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            Event::ItemAdded { item } => {
                self.items.push(item);
                self.idempotency_key = None;
            }

            Event::ItemRemoved { id, .. } => {
                self.items.retain(|item| item.id != id);
                self.idempotency_key = None;
            }

            Event::CartCleared => {
                self.items.clear();
                self.idempotency_key = None;
            }

            Event::CommitStarted { idempotency_key } => {
                self.committing = true;
                self.idempotency_key = Some(idempotency_key);
            }

            Event::CommitSucceeded { .. } => {
                self.committing = false;
                self.items.clear();
                self.idempotency_key = None;
            }

            // The key survives so a retry of the unchanged cart reuses it.
            Event::CommitFailed { .. } => {
                self.committing = false;
            }
        }
    }
}

impl<W: Workflow> CartState<W> {
    pub fn status(&self) -> CartStatus {
        if self.committing {
            CartStatus::Committing
        } else if self.items.is_empty() {
            CartStatus::Empty
        } else {
            CartStatus::Staging
        }
    }

    /// Sum of `quantity * unit_price` over priced items.
    pub fn total(&self) -> Decimal {
        self.items
            .iter()
            .filter_map(LineItem::computed_total)
            .sum()
    }

    pub(crate) fn validate_mutable(&self) -> Result<(), RejectReason> {
        if self.committing {
            return Err(RejectReason::CommitInProgress);
        }
        Ok(())
    }

    fn validate_committing(&self, to: CartStatus) -> Result<String, RejectReason> {
        match (&self.idempotency_key, self.committing) {
            (Some(key), true) => Ok(key.clone()),
            _ => Err(RejectReason::InvalidTransition {
                from: self.status().to_string(),
                to: to.to_string(),
            }),
        }
    }

    pub(crate) fn validate_unique_lot(&self, code: &str) -> Result<(), RejectReason> {
        if self
            .items
            .iter()
            .any(|item| item.lot_code.as_deref() == Some(code))
        {
            return Err(RejectReason::DuplicateLot {
                lot_code: code.to_string(),
            });
        }
        Ok(())
    }

    fn validate_candidate(&self, candidate: &Candidate<W::Detail>) -> Result<(), RejectReason> {
        if candidate.quantity <= 0 {
            return Err(RejectReason::InvalidQuantity);
        }

        if let Some(available) = candidate.max_quantity {
            if candidate.quantity > i64::from(available) {
                return Err(RejectReason::ExceedsStock {
                    requested: candidate.quantity,
                    available,
                });
            }
        }

        // Only reachable without a known stock bound.
        if candidate.quantity > i64::from(u32::MAX) {
            return Err(RejectReason::InvalidQuantity);
        }

        if W::PRICED {
            match candidate.unit_price {
                Some(price) if !price.is_sign_negative() => {}
                _ => return Err(RejectReason::InvalidPrice),
            }
        }

        if W::DEDUP_BY_LOT {
            if let Some(code) = candidate.lot_code.as_deref() {
                self.validate_unique_lot(code)?;
            }
        }

        Ok(())
    }
}
