use std::sync::{Arc, Mutex};

use cqrs_es::{mem_store::MemStore, CqrsFramework};

use crate::workflows::Workflow;

use super::{
    aggregate::{CartState, Services},
    view::{CartProjection, Query, Renderer},
};

pub type CartStore<W> = MemStore<CartState<W>>;

pub type CartFramework<W> = CqrsFramework<CartState<W>, CartStore<W>>;

/// Framework over an in-memory event store, with one query feeding the
/// shared projection and the optional renderer.
pub fn init<W: Workflow>(
    store: CartStore<W>,
    projection: Arc<Mutex<CartProjection<W>>>,
    renderer: Option<Box<dyn Renderer<W::Detail>>>,
) -> CartFramework<W> {
    let query: Box<dyn cqrs_es::Query<CartState<W>>> = Box::new(Query::new(projection, renderer));

    CqrsFramework::new(store, vec![query], Services::default())
}
