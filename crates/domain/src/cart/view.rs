use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use cqrs_es::{Aggregate, EventEnvelope, View as CqrsView};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{inputs::ReferenceId, workflows::Workflow};

use super::{
    aggregate::{CartState, CartStatus},
    item::LineItemId,
    Event,
};

/// Snapshot handed to the renderer after every change.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct CartView<D> {
    pub cart_id: String,
    pub status: CartStatus,
    pub rows: Vec<Row<D>>,
    pub total: Decimal,
    /// The confirm control is enabled only while staging.
    pub can_commit: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Row<D> {
    /// 1-based, recomputed from position on every render
    pub position: usize,
    pub id: LineItemId,
    pub reference_id: ReferenceId,
    pub label: String,
    pub lot_code: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<Decimal>,
    pub total: Option<Decimal>,
    pub detail: D,
}

impl<D> CartView<D> {
    /// True when the table should show its placeholder row.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at a 1-based display position.
    pub fn row(&self, position: usize) -> Option<&Row<D>> {
        position.checked_sub(1).and_then(|index| self.rows.get(index))
    }
}

impl<D: Clone> CartView<D> {
    pub fn from_state<W>(cart_id: &str, cart: &CartState<W>) -> Self
    where
        W: Workflow<Detail = D>,
    {
        let rows = cart
            .items
            .iter()
            .enumerate()
            .map(|(index, item)| Row {
                position: index + 1,
                id: item.id,
                reference_id: item.reference_id.clone(),
                label: item.display_label.clone(),
                lot_code: item.lot_code.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total: item.computed_total(),
                detail: item.detail.clone(),
            })
            .collect();

        let status = cart.status();

        Self {
            cart_id: cart_id.to_string(),
            status,
            rows,
            total: cart.total(),
            can_commit: status == CartStatus::Staging,
        }
    }
}

/// Called after every applied event so a host can keep its table in sync.
pub trait Renderer<D>: Send {
    fn render(&mut self, event: &Event<D>, view: &CartView<D>);
}

impl<D, F> Renderer<D> for F
where
    F: FnMut(&Event<D>, &CartView<D>) + Send,
{
    fn render(&mut self, event: &Event<D>, view: &CartView<D>) {
        self(event, view)
    }
}

/// Read model of one cart, folded from its committed events.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(bound(
    serialize = "W::Detail: Serialize",
    deserialize = "W::Detail: DeserializeOwned"
))]
pub struct CartProjection<W: Workflow> {
    pub id: String,
    pub sequence: usize,
    pub cart: CartState<W>,
}

impl<W: Workflow> Default for CartProjection<W> {
    fn default() -> Self {
        Self {
            id: String::new(),
            sequence: 0,
            cart: CartState::default(),
        }
    }
}

impl<W: Workflow> CqrsView<CartState<W>> for CartProjection<W> {
    fn update(&mut self, event: &EventEnvelope<CartState<W>>) {
        self.id.clone_from(&event.aggregate_id);
        self.sequence = event.sequence;
        self.cart.apply(event.payload.clone());
    }
}

/// Keeps the shared projection current and forwards each event to the
/// renderer, if any.
pub struct Query<W: Workflow> {
    projection: Arc<Mutex<CartProjection<W>>>,
    renderer: Option<Mutex<Box<dyn Renderer<W::Detail>>>>,
}

impl<W: Workflow> Query<W> {
    pub fn new(
        projection: Arc<Mutex<CartProjection<W>>>,
        renderer: Option<Box<dyn Renderer<W::Detail>>>,
    ) -> Self {
        Self {
            projection,
            renderer: renderer.map(Mutex::new),
        }
    }
}

#[async_trait]
impl<W: Workflow> cqrs_es::Query<CartState<W>> for Query<W> {
    async fn dispatch(&self, cart_id: &str, events: &[EventEnvelope<CartState<W>>]) {
        for event in events {
            let view = {
                let mut projection = locked(&self.projection);
                projection.update(event);
                CartView::from_state(cart_id, &projection.cart)
            };

            tracing::debug!(
                "{} #{} on {} cart {}",
                cqrs_es::DomainEvent::event_type(&event.payload),
                event.sequence,
                W::NAME,
                cart_id
            );

            if let Some(renderer) = &self.renderer {
                locked(renderer).render(&event.payload, &view);
            }
        }
    }
}

pub(crate) fn locked<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
