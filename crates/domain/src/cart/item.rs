use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::inputs::ReferenceId;

/// Stable per-item id, assigned by the cart when the item is added.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(transparent)]
pub struct LineItemId(Ulid);

impl LineItemId {
    pub(crate) fn generate() -> Self {
        Self(Ulid::new())
    }
}

impl fmt::Display for LineItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A provisional row in a staging cart
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct LineItem<D> {
    pub id: LineItemId,
    pub reference_id: ReferenceId,
    pub display_label: String,
    pub lot_code: Option<String>,
    pub quantity: u32,
    pub unit_price: Option<Decimal>,
    pub detail: D,
}

impl<D> LineItem<D> {
    /// `quantity * unit_price`, recomputed on every call.
    pub fn computed_total(&self) -> Option<Decimal> {
        self.unit_price.map(|price| price * Decimal::from(self.quantity))
    }
}

/// An item the operator wants to add, before the cart has validated it.
///
/// The reference id comes from a lookup record; quantity is kept signed so
/// that bad operator input reaches validation instead of failing to parse.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct Candidate<D> {
    pub reference_id: ReferenceId,
    pub display_label: String,
    pub lot_code: Option<String>,
    pub quantity: i64,
    pub max_quantity: Option<u32>,
    pub unit_price: Option<Decimal>,
    pub detail: D,
}

impl<D> Candidate<D> {
    pub(crate) fn into_line_item(self, id: LineItemId) -> LineItem<D> {
        LineItem {
            id,
            reference_id: self.reference_id,
            display_label: self.display_label,
            lot_code: self.lot_code,
            // validated positive by the cart before conversion
            quantity: u32::try_from(self.quantity).unwrap_or(0),
            unit_price: self.unit_price,
            detail: self.detail,
        }
    }
}
