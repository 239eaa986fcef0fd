//! Pharmacy staging carts: line items collected client-side and committed to
//! the inventory backend in one request.

/// Generic staging cart aggregate
pub mod cart;

/// Domain errors
pub mod errors;

/// Backend wire shapes
pub mod inputs;

/// CPM edits, lot edits and stock alert levels
pub mod inventory;

/// Backend ports
pub mod ports;

/// Entry report snapshot
pub mod report;

/// Debounced medication search
pub mod search;

/// Commit and scan round trips
pub mod session;

/// Entry, dispensing and bulk upload screens
pub mod workflows;

pub use cart::{CartStatus, CartView, StagingCart};
pub use errors::{Error, RejectReason};
pub use session::CartSession;
