//! Operator-declared skip rules.
//!
//! A [`SkipOption`] suppresses strategies matching a predicate, either for every
//! entity or only for a listed set. Skips are evaluated before dispatch and are
//! not failures: nothing is attempted and nothing reaches the ledger.

use crate::error::{SyncError, SyncResult};
use crmsync_model::Entity;
use crmsync_storage::EntityStore;
use crmsync_types::{EntityRef, EntityType, Operation, StrategyKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Matches strategy kinds. `None` on either axis is a wildcard, so a predicate
/// with only `operation = Push` covers every push strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StrategyPredicate {
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    #[serde(default)]
    pub operation: Option<Operation>,
}

impl StrategyPredicate {
    /// Matches every strategy.
    pub const fn any() -> Self {
        Self {
            entity_type: None,
            operation: None,
        }
    }

    /// Matches every strategy performing `operation`.
    pub const fn operation(operation: Operation) -> Self {
        Self {
            entity_type: None,
            operation: Some(operation),
        }
    }

    /// Matches every strategy for `entity_type`.
    pub const fn entity_type(entity_type: EntityType) -> Self {
        Self {
            entity_type: Some(entity_type),
            operation: None,
        }
    }

    pub fn matches(&self, kind: &StrategyKind) -> bool {
        self.entity_type.is_none_or(|t| t == kind.entity_type)
            && self.operation.is_none_or(|o| o == kind.operation)
    }
}

impl From<StrategyKind> for StrategyPredicate {
    fn from(kind: StrategyKind) -> Self {
        Self {
            entity_type: Some(kind.entity_type),
            operation: Some(kind.operation),
        }
    }
}

/// Decides whether a listed entity and a candidate are "the same".
pub type EntityComparator = Arc<dyn Fn(&Entity, &Entity) -> bool + Send + Sync>;

/// Identity comparison: same type and id.
pub fn same_entity(a: &Entity, b: &Entity) -> bool {
    a.entity_type == b.entity_type && a.id == b.id
}

/// An immutable skip rule. Builder methods consume the value and return a new one.
#[derive(Clone)]
pub struct SkipOption {
    strategy: StrategyPredicate,
    entities: Arc<[Entity]>,
    compare: EntityComparator,
}

impl SkipOption {
    /// A rule suppressing every strategy matched by `strategy`, for all entities.
    pub fn for_strategy(strategy: impl Into<StrategyPredicate>) -> Self {
        Self {
            strategy: strategy.into(),
            entities: Arc::from(Vec::new()),
            compare: Arc::new(same_entity),
        }
    }

    /// Restricts the rule to the given entities.
    pub fn for_entities(self, entities: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            entities: entities.into_iter().collect(),
            ..self
        }
    }

    /// Replaces the comparison used to find an entity in the list.
    pub fn compare_entities_using<F>(self, compare: F) -> Self
    where
        F: Fn(&Entity, &Entity) -> bool + Send + Sync + 'static,
    {
        Self {
            compare: Arc::new(compare),
            ..self
        }
    }

    pub fn strategy(&self) -> &StrategyPredicate {
        &self.strategy
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// True if this rule suppresses `kind` for `entity`.
    pub fn implies(&self, kind: &StrategyKind, entity: &Entity) -> bool {
        self.strategy.matches(kind)
            && (self.entities.is_empty() || self.entities.iter().any(|listed| (self.compare)(entity, listed)))
    }
}

impl fmt::Debug for SkipOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SkipOption")
            .field("strategy", &self.strategy)
            .field(
                "entities",
                &self.entities.iter().map(Entity::entity_ref).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

/// Ordered set of skip rules; skips when any member does.
#[derive(Debug, Clone, Default)]
pub struct SkipOptionCollection {
    options: Vec<SkipOption>,
}

impl SkipOptionCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new collection with `option` appended.
    pub fn with(mut self, option: SkipOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SkipOption> {
        self.options.iter()
    }

    pub fn implies(&self, kind: &StrategyKind, entity: &Entity) -> bool {
        self.options.iter().any(|o| o.implies(kind, entity))
    }

    pub fn doesnt_imply(&self, kind: &StrategyKind, entity: &Entity) -> bool {
        !self.implies(kind, entity)
    }

    /// Same as [`implies`](Self::implies); reads better at call sites.
    pub fn should_skip(&self, kind: &StrategyKind, entity: &Entity) -> bool {
        self.implies(kind, entity)
    }
}

impl FromIterator<SkipOption> for SkipOptionCollection {
    fn from_iter<I: IntoIterator<Item = SkipOption>>(iter: I) -> Self {
        Self {
            options: iter.into_iter().collect(),
        }
    }
}

/// A skip rule as written in the engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkipRuleConfig {
    #[serde(flatten)]
    pub strategy: StrategyPredicate,
    /// Entities the rule is limited to; empty means all.
    #[serde(default)]
    pub entities: Vec<EntityRef>,
}

impl SkipRuleConfig {
    /// Resolves the listed entity references against the local store.
    pub fn build(&self, store: &EntityStore) -> SyncResult<SkipOption> {
        let mut entities = Vec::with_capacity(self.entities.len());
        for entity_ref in &self.entities {
            let entity = store.get_ref(entity_ref)?.ok_or_else(|| {
                SyncError::Configuration(format!("skip rule references unknown entity {entity_ref}"))
            })?;
            entities.push(entity);
        }
        Ok(SkipOption::for_strategy(self.strategy).for_entities(entities))
    }
}
