//! HTTP adapter between the staging carts and the pharmacy backend.

/// Client and endpoint plumbing
pub mod backend;

/// Entry and dispensing commits
pub mod commits;

/// Environment configuration
pub mod config;

/// CPM and lot row edits
pub mod inventory;

/// Medication, lot and patient lookups
pub mod lookups;

/// Bulk upload and report downloads
pub mod uploads;

pub use backend::{HttpBackend, CSRF_HEADER, IDEMPOTENCY_HEADER};
pub use config::ClientConfig;
