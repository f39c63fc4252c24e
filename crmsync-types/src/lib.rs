//! Core type definitions for crmsync.
//!
//! This crate defines the small, dependency-free vocabulary shared by the
//! storage layer, the sync engine and the admin API:
//! - Local and remote identifiers (UUID v7 / opaque strings)
//! - Entity type tags and typed entity references
//! - Strategy keys (`entity type × operation`) and the acting causer
//! - Validation-level flag sets and tri-state remote fields

mod causer;
mod entity;
mod field;
mod ids;
mod strategy;
mod validation;

pub use causer::Causer;
pub use entity::{EntityRef, EntityType};
pub use field::Field;
pub use ids::{BusinessUnitId, EntityId, RemoteId, UserId};
pub use strategy::{Direction, Operation, StrategyKind};
pub use validation::ValidationLevel;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("unknown validation flag: {0}")]
    UnknownValidationFlag(String),
}
