//! Entity type tags and polymorphic entity references.

use crate::{EntityId, Error};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of CRM records the sync engine knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Company,
    Contact,
    Opportunity,
    Quote,
    Task,
    Appointment,
    Product,
    Currency,
}

impl EntityType {
    /// Every entity type, in declaration order.
    pub const ALL: [EntityType; 8] = [
        EntityType::Company,
        EntityType::Contact,
        EntityType::Opportunity,
        EntityType::Quote,
        EntityType::Task,
        EntityType::Appointment,
        EntityType::Product,
        EntityType::Currency,
    ];

    /// Stable lowercase tag, used in storage and wire formats.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityType::Company => "company",
            EntityType::Contact => "contact",
            EntityType::Opportunity => "opportunity",
            EntityType::Quote => "quote",
            EntityType::Task => "task",
            EntityType::Appointment => "appointment",
            EntityType::Product => "product",
            EntityType::Currency => "currency",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::UnknownEntityType(s.to_string()))
    }
}

/// A typed reference to a local entity (type tag + id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityType,
    pub id: EntityId,
}

impl EntityRef {
    pub const fn new(entity_type: EntityType, id: EntityId) -> Self {
        Self { entity_type, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.id)
    }
}
