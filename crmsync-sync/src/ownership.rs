//! Ownership changes with optional cascade to linked records.
//!
//! Uses the same registry and dispatch mechanism as the sync strategies, keyed
//! by [`Operation::ChangeOwnership`]. The cascade is one level deep: each
//! directly linked model is changed once, and its own links are not followed.

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::registry::{Execution, Strategy, StrategyRegistry};
use async_trait::async_trait;
use crmsync_model::Entity;
use crmsync_storage::EntityStore;
use crmsync_types::{EntityRef, EntityType, Operation, StrategyKind, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Parameters of an ownership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOwnershipData {
    pub new_owner_id: UserId,
    /// Grant the previous owner editor access instead of dropping it.
    #[serde(default)]
    pub keep_original_owner_as_editor: bool,
    /// Also move directly linked records.
    #[serde(default)]
    pub transfer_linked_records: bool,
}

impl ChangeOwnershipData {
    pub fn new(new_owner_id: UserId) -> Self {
        Self {
            new_owner_id,
            keep_original_owner_as_editor: false,
            transfer_linked_records: false,
        }
    }

    pub fn keep_original_owner_as_editor(mut self, keep: bool) -> Self {
        self.keep_original_owner_as_editor = keep;
        self
    }

    pub fn transfer_linked_records(mut self, transfer: bool) -> Self {
        self.transfer_linked_records = transfer;
        self
    }
}

/// Changes the owner of one entity type.
#[async_trait]
pub trait OwnershipStrategy: Strategy {
    async fn change_owner(
        &self,
        model: &Entity,
        data: &ChangeOwnershipData,
        ctx: &SyncContext,
    ) -> SyncResult<Execution<Entity>>;

    /// Records whose ownership follows `model` when linked records are transferred.
    fn linked_models(&self, _model: &Entity) -> SyncResult<Vec<Entity>> {
        Ok(Vec::new())
    }
}

/// Registry of ownership strategies.
pub type OwnershipRegistry = StrategyRegistry<dyn OwnershipStrategy>;

/// Store-backed ownership strategy for one entity type.
///
/// Linked models are the directly linked entities whose type is in
/// `linked_types`.
pub struct EntityOwnershipStrategy {
    entity_type: EntityType,
    linked_types: Vec<EntityType>,
    store: EntityStore,
}

impl EntityOwnershipStrategy {
    pub fn new(entity_type: EntityType, store: EntityStore) -> Self {
        Self {
            entity_type,
            linked_types: default_linked_types(entity_type).to_vec(),
            store,
        }
    }

    pub fn with_linked_types(mut self, linked_types: Vec<EntityType>) -> Self {
        self.linked_types = linked_types;
        self
    }
}

/// Which linked types follow an owner change by default.
pub fn default_linked_types(entity_type: EntityType) -> &'static [EntityType] {
    match entity_type {
        EntityType::Company => &[
            EntityType::Contact,
            EntityType::Opportunity,
            EntityType::Task,
            EntityType::Appointment,
        ],
        EntityType::Contact => &[EntityType::Task, EntityType::Appointment, EntityType::Opportunity],
        EntityType::Opportunity => &[EntityType::Quote, EntityType::Task],
        _ => &[],
    }
}

impl Strategy for EntityOwnershipStrategy {
    fn name(&self) -> &'static str {
        "entity_ownership"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::change_ownership(self.entity_type)
    }
}

#[async_trait]
impl OwnershipStrategy for EntityOwnershipStrategy {
    async fn change_owner(
        &self,
        model: &Entity,
        data: &ChangeOwnershipData,
        ctx: &SyncContext,
    ) -> SyncResult<Execution<Entity>> {
        if model.owner_id == Some(data.new_owner_id) {
            return Ok(Execution::Completed(model.clone()));
        }
        let changed = self.store.change_owner(
            model,
            data.new_owner_id,
            data.keep_original_owner_as_editor,
            &ctx.causer_label(),
        )?;
        Ok(Execution::Completed(changed))
    }

    fn linked_models(&self, model: &Entity) -> SyncResult<Vec<Entity>> {
        Ok(self
            .store
            .linked(&model.id)?
            .into_iter()
            .filter(|linked| self.linked_types.contains(&linked.entity_type))
            .collect())
    }
}

/// Ownership strategies for every type that has owners. Currency is shared
/// reference data and has none.
pub fn standard_ownership_registry(store: &EntityStore) -> OwnershipRegistry {
    let mut registry = OwnershipRegistry::new();
    for entity_type in EntityType::ALL {
        if entity_type != EntityType::Currency {
            registry.register(Arc::new(EntityOwnershipStrategy::new(entity_type, store.clone())));
        }
    }
    registry
}

/// A linked model that could not be transferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedFailure {
    pub entity: EntityRef,
    pub error: String,
}

/// Result of an ownership change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipReport {
    /// The primary model after the change.
    pub primary: Entity,
    /// Linked models whose owner was changed.
    pub transferred: Vec<EntityRef>,
    /// Linked models that failed; the primary change stands.
    pub failures: Vec<LinkedFailure>,
}

impl OwnershipReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Entry point for ownership changes.
pub struct OwnershipPropagationService {
    registry: OwnershipRegistry,
}

impl OwnershipPropagationService {
    pub fn new(registry: OwnershipRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &OwnershipRegistry {
        &self.registry
    }

    /// Changes the owner of `model` and, if requested, of its linked models.
    ///
    /// Fails with [`SyncError::UnsupportedModel`] when no ownership strategy
    /// handles the model. Failures on linked models are reported, not returned.
    pub async fn change_ownership(
        &self,
        model: &Entity,
        data: &ChangeOwnershipData,
        ctx: &SyncContext,
    ) -> SyncResult<OwnershipReport> {
        let dispatched = self.change_one(model, data, ctx).await?;
        let mut report = OwnershipReport {
            primary: dispatched.outcome,
            transferred: Vec::new(),
            failures: Vec::new(),
        };

        if !data.transfer_linked_records {
            info!("Changed owner of {} to {}", model.entity_ref(), data.new_owner_id);
            return Ok(report);
        }

        for linked in dispatched.strategy.linked_models(model)? {
            match self.change_one(&linked, data, ctx).await {
                Ok(_) => report.transferred.push(linked.entity_ref()),
                Err(err) => {
                    warn!(error = %err, "Failed to transfer linked {}", linked.entity_ref());
                    report.failures.push(LinkedFailure {
                        entity: linked.entity_ref(),
                        error: err.to_string(),
                    });
                }
            }
        }

        info!(
            transferred = report.transferred.len(),
            failed = report.failures.len(),
            "Changed owner of {} to {}",
            model.entity_ref(),
            data.new_owner_id
        );
        Ok(report)
    }

    async fn change_one(
        &self,
        model: &Entity,
        data: &ChangeOwnershipData,
        ctx: &SyncContext,
    ) -> SyncResult<crate::registry::Dispatched<dyn OwnershipStrategy, Entity>> {
        self.registry
            .dispatch(model, Operation::ChangeOwnership, |strategy| async move {
                strategy.change_owner(model, data, ctx).await
            })
            .await
            .map_err(|err| match err {
                SyncError::NoApplicableStrategy { entity, .. } => SyncError::UnsupportedModel { entity },
                other => other,
            })
    }
}
