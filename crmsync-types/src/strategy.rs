//! Strategy keys: which operation a strategy performs on which entity type.

use crate::EntityType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Local -> remote.
    Push,
    /// Remote -> local.
    Pull,
}

/// Everything a strategy can be registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Push,
    Pull,
    ChangeOwnership,
}

impl From<Direction> for Operation {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Push => Operation::Push,
            Direction::Pull => Operation::Pull,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Push => f.write_str("push"),
            Operation::Pull => f.write_str("pull"),
            Operation::ChangeOwnership => f.write_str("change_ownership"),
        }
    }
}

/// The registry key of a strategy: `(entity type, operation)`.
///
/// Strategies, resolvers and skip rules all talk about strategies through
/// this key instead of inspecting concrete strategy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyKind {
    pub entity_type: EntityType,
    pub operation: Operation,
}

impl StrategyKind {
    pub const fn new(entity_type: EntityType, operation: Operation) -> Self {
        Self {
            entity_type,
            operation,
        }
    }

    pub const fn push(entity_type: EntityType) -> Self {
        Self::new(entity_type, Operation::Push)
    }

    pub const fn pull(entity_type: EntityType) -> Self {
        Self::new(entity_type, Operation::Pull)
    }

    pub const fn change_ownership(entity_type: EntityType) -> Self {
        Self::new(entity_type, Operation::ChangeOwnership)
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.operation, self.entity_type)
    }
}
