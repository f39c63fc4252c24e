//! SQLite storage layer for crmsync.
//!
//! Provides persistent storage for local CRM entities.
//!
//! # Architecture
//!
//! - Entities are stored as JSON `data` plus typed ownership/link columns
//! - Every entity carries a `version` used for optimistic concurrency
//! - Directed entity links back the "linked records" ownership cascade
//! - Editor grants keep a previous owner's access after a transfer

mod entity_store;
mod error;

pub use entity_store::EntityStore;
pub use error::{StorageError, StorageResult};
