//! Record model for crmsync.
//!
//! Defines the types the storage layer and the sync engine exchange:
//! - [`Entity`] — a local CRM record (typed, owned, optionally linked to a remote id)
//! - [`RemoteRecord`] — a record as the remote CRM returns it
//! - [`Attributes`] — the flat attribute map both sides are compared in
//! - [`EntityMapping`] — per entity type field tables used by the generic strategies

mod entity;
pub mod mapping;
mod remote;

pub use entity::{now_millis, Entity};
pub use mapping::{mapping_for, EntityMapping, FieldMapping};
pub use remote::{Attributes, RemoteRecord};

/// Remote attribute carrying the local entity id, used as the shared external reference.
pub const EXTERNAL_REFERENCE: &str = "external_reference";

/// Remote attribute carrying the owning user.
pub const OWNER_ATTRIBUTE: &str = "owner_id";

/// Remote attribute carrying the owning business unit.
pub const BUSINESS_UNIT_ATTRIBUTE: &str = "business_unit_id";
