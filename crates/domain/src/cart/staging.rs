use std::{collections::HashMap, fmt, sync::{Arc, Mutex}};

use chrono::Utc;
use cqrs_es::{AggregateError, EventEnvelope, EventStore};
use rust_decimal::Decimal;
use ulid::Ulid;

use crate::{errors::RejectReason, workflows::Workflow};

use super::{
    aggregate::{CartState, CartStatus},
    cqrs::{self, CartFramework, CartStore},
    item::{Candidate, LineItem, LineItemId},
    view::{locked, CartProjection, CartView, Renderer},
    Command,
};

pub type JournalEntry<W> = EventEnvelope<CartState<W>>;

/// Transient, session-scoped collection of line items awaiting one commit.
///
/// Commands go through a `CqrsFramework` backed by an in-memory event store;
/// reads come from the projection its query keeps current.
pub struct StagingCart<W: Workflow> {
    id: Ulid,
    store: CartStore<W>,
    cqrs: CartFramework<W>,
    projection: Arc<Mutex<CartProjection<W>>>,
    state: CartState<W>,
    lookup: Option<W::Lookup>,
}

impl<W: Workflow> Default for StagingCart<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Workflow> fmt::Debug for StagingCart<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagingCart")
            .field("workflow", &W::NAME)
            .field("id", &self.id)
            .field("items", &self.state.items)
            .field("status", &self.status())
            .field("lookup", &self.lookup)
            .finish()
    }
}

impl<W: Workflow> StagingCart<W> {
    pub fn new() -> Self {
        let store = CartStore::<W>::default();
        let projection = Arc::new(Mutex::new(CartProjection::default()));
        Self {
            id: Ulid::new(),
            cqrs: cqrs::init(store.clone(), projection.clone(), None),
            store,
            projection,
            state: CartState::default(),
            lookup: None,
        }
    }

    pub fn with_renderer(mut self, renderer: impl Renderer<W::Detail> + 'static) -> Self {
        self.cqrs = cqrs::init(
            self.store.clone(),
            self.projection.clone(),
            Some(Box::new(renderer)),
        );
        self
    }

    pub fn id(&self) -> Ulid {
        self.id
    }

    pub fn status(&self) -> CartStatus {
        self.state.status()
    }

    pub fn items(&self) -> &[LineItem<W::Detail>] {
        &self.state.items
    }

    pub fn len(&self) -> usize {
        self.state.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.items.is_empty()
    }

    /// Sum of `quantity * unit_price` over priced items.
    pub fn total(&self) -> Decimal {
        self.state.total()
    }

    pub fn lookup(&self) -> Option<&W::Lookup> {
        self.lookup.as_ref()
    }

    pub fn idempotency_key(&self) -> Option<&str> {
        self.state.idempotency_key.as_deref()
    }

    pub fn view(&self) -> CartView<W::Detail> {
        CartView::from_state(&self.id.to_string(), &self.state)
    }

    /// Every committed event of this cart, in sequence order.
    pub async fn journal(&self) -> Result<Vec<JournalEntry<W>>, RejectReason> {
        self.store
            .load_events(&self.id.to_string())
            .await
            .map_err(rejection)
    }

    /// Make `lookup` the current candidate. In lot-keyed workflows a lot that
    /// is already staged is refused here, before the operator types a quantity.
    pub fn set_lookup(&mut self, lookup: W::Lookup) -> Result<(), RejectReason> {
        self.state.validate_mutable()?;
        self.lookup = None;

        if W::DEDUP_BY_LOT {
            if let Some(code) = W::lookup_lot_code(&lookup) {
                self.state.validate_unique_lot(code)?;
            }
        }

        self.lookup = Some(lookup);
        Ok(())
    }

    pub fn clear_lookup(&mut self) {
        self.lookup = None;
    }

    /// Add the active lookup with the operator's quantity and input.
    ///
    /// A non-positive quantity is refused before anything else is looked at.
    pub async fn add(&mut self, quantity: i64, input: W::Input) -> Result<LineItemId, RejectReason> {
        if quantity <= 0 {
            return Err(RejectReason::InvalidQuantity);
        }
        self.state.validate_mutable()?;
        let lookup = self.lookup.as_ref().ok_or(RejectReason::NoActiveLookup)?;
        let candidate = W::candidate(lookup, quantity, input)?;

        self.add_item(candidate).await
    }

    /// Add a fully formed candidate; clears the active lookup on success.
    pub async fn add_item(&mut self, candidate: Candidate<W::Detail>) -> Result<LineItemId, RejectReason> {
        let id = LineItemId::generate();
        self.execute(Command::AddItem { id, candidate }).await?;
        self.lookup = None;
        Ok(id)
    }

    pub async fn remove(&mut self, id: LineItemId) -> Result<(), RejectReason> {
        self.execute(Command::RemoveItem { id }).await
    }

    pub async fn remove_at(&mut self, index: usize) -> Result<(), RejectReason> {
        self.execute(Command::RemoveAt { index }).await
    }

    pub async fn clear(&mut self) -> Result<(), RejectReason> {
        self.execute(Command::Clear).await?;
        self.lookup = None;
        Ok(())
    }

    /// Enter `Committing` and return the idempotency key for the request.
    pub async fn begin_commit(&mut self) -> Result<String, RejectReason> {
        self.execute(Command::BeginCommit {
            idempotency_key: Ulid::new().to_string(),
        })
        .await?;

        self.state
            .idempotency_key
            .clone()
            .ok_or(RejectReason::EmptyCart)
    }

    pub async fn complete_commit(&mut self) -> Result<(), RejectReason> {
        self.execute(Command::CompleteCommit).await?;
        self.lookup = None;
        Ok(())
    }

    pub async fn fail_commit(&mut self, message: impl Into<String>) -> Result<(), RejectReason> {
        self.execute(Command::FailCommit {
            message: message.into(),
        })
        .await
    }

    /// Check that the cart and `header` can be committed.
    pub fn validate_submission(&self, header: &W::Header) -> Result<(), RejectReason> {
        if self.state.items.is_empty() {
            return Err(RejectReason::EmptyCart);
        }
        W::validate_header(header)
    }

    /// Body for the commit endpoint. Lookup state is never included. Values
    /// the workflow fills in on its own derive from the pending idempotency
    /// key, so every attempt under one key sends the same body.
    pub fn to_submission_payload(&self, header: &W::Header) -> Result<W::Payload, RejectReason> {
        self.validate_submission(header)?;
        Ok(W::payload(header, &self.state.items, self.idempotency_key()))
    }

    pub async fn execute(&mut self, command: Command<W::Detail>) -> Result<(), RejectReason> {
        let metadata = HashMap::from([
            ("workflow".to_string(), W::NAME.to_string()),
            ("recorded_at".to_string(), Utc::now().to_rfc3339()),
        ]);

        self.cqrs
            .execute_with_metadata(&self.id.to_string(), command, metadata)
            .await
            .map_err(rejection)?;

        self.state = locked(&self.projection).cart.clone();
        Ok(())
    }
}

fn rejection(err: AggregateError<RejectReason>) -> RejectReason {
    match err {
        AggregateError::UserError(reason) => reason,
        other => {
            tracing::error!("Cart event store failed: {}", other);
            RejectReason::Store {
                message: other.to_string(),
            }
        }
    }
}
