/// Staging cart aggregate
pub mod aggregate;

/// Commands
pub mod commands;

/// CQRS setup
pub mod cqrs;

/// Events
pub mod events;

/// Line items and candidates
pub mod item;

/// Cart handle used by sessions and hosts
pub mod staging;

/// Render snapshot and read model
pub mod view;


pub use aggregate::{CartState, CartStatus, Services, AGGREGATE_TYPE};
pub use commands::Command;
pub use events::Event;
pub use item::{Candidate, LineItem, LineItemId};
pub use staging::{JournalEntry, StagingCart};
pub use view::{CartProjection, CartView, Query, Renderer, Row};
