use super::validate::{build_input, check_required};
use super::{
    decline, find_candidates, local_attributes, persist_merge, MergeScope, SyncAction, SyncOutcome,
    SyncServices, SyncStrategy,
};
use crate::context::SyncContext;
use crate::correlation::Correlation;
use crate::error::SyncResult;
use crate::registry::{Execution, Strategy};
use async_trait::async_trait;
use crmsync_model::Entity;
use crmsync_types::{EntityType, StrategyKind};
use std::sync::Arc;
use tracing::{debug, info};

/// Pushes an entity that already knows its remote id.
///
/// Declines when the linked remote record has disappeared, so the
/// correlating variant can take over.
pub struct PushLinked {
    entity_type: EntityType,
    services: Arc<SyncServices>,
}

impl PushLinked {
    pub fn new(entity_type: EntityType, services: Arc<SyncServices>) -> Self {
        Self {
            entity_type,
            services,
        }
    }
}

impl Strategy for PushLinked {
    fn name(&self) -> &'static str {
        "push_linked"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::push(self.entity_type)
    }

    fn applies(&self, model: &Entity) -> bool {
        model.entity_type == self.entity_type && model.remote_id.is_some()
    }
}

#[async_trait]
impl SyncStrategy for PushLinked {
    async fn execute(&self, model: &Entity, ctx: &SyncContext) -> SyncResult<Execution<SyncOutcome>> {
        let Some(remote_id) = model.remote_id.as_ref() else {
            return decline(model, "not linked to a remote record");
        };

        let Some(existing) = self.services.remote.find(model.entity_type, remote_id).await? else {
            return decline(model, format!("remote record {remote_id} no longer exists"));
        };

        let input = build_input(model, Some(&existing), &self.services.store, ctx)?;
        if input.is_empty() {
            debug!("No changes to push for {}", model.entity_ref());
            return Ok(Execution::Completed(SyncOutcome::new(
                SyncAction::Unchanged,
                model,
                Some(remote_id.clone()),
            )));
        }

        let updated = self
            .services
            .remote
            .update(model.entity_type, remote_id, &input, ctx.validation)
            .await?;
        persist_merge(&self.services, model, &updated, MergeScope::ReadOnly, ctx)?;

        info!(attributes = input.len(), "Pushed {} to {}", model.entity_ref(), updated.id);
        Ok(Execution::Completed(SyncOutcome::new(
            SyncAction::Updated,
            model,
            Some(updated.id),
        )))
    }
}

/// Pushes an entity without a usable remote id: correlates against remote
/// candidates, then updates and links the match or creates a new record.
pub struct PushUnlinked {
    entity_type: EntityType,
    services: Arc<SyncServices>,
}

impl PushUnlinked {
    pub fn new(entity_type: EntityType, services: Arc<SyncServices>) -> Self {
        Self {
            entity_type,
            services,
        }
    }
}

impl Strategy for PushUnlinked {
    fn name(&self) -> &'static str {
        "push_unlinked"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::push(self.entity_type)
    }
}

#[async_trait]
impl SyncStrategy for PushUnlinked {
    async fn execute(&self, model: &Entity, ctx: &SyncContext) -> SyncResult<Execution<SyncOutcome>> {
        let services = &self.services;
        check_required(model, ctx)?;
        let local = local_attributes(model, &services.store)?;
        let candidates = find_candidates(services, model, &local).await?;

        match services.correlation.resolve(&self.kind(), &local, &candidates)? {
            Correlation::Matched(existing) => {
                let input = build_input(model, Some(&existing), &services.store, ctx)?;
                let record = if input.is_empty() {
                    existing
                } else {
                    services
                        .remote
                        .update(model.entity_type, &existing.id, &input, ctx.validation)
                        .await?
                };
                persist_merge(services, model, &record, MergeScope::ReadOnly, ctx)?;

                info!("Linked {} to existing remote record {}", model.entity_ref(), record.id);
                Ok(Execution::Completed(SyncOutcome::new(
                    SyncAction::Updated,
                    model,
                    Some(record.id),
                )))
            }
            Correlation::NotFound => {
                let input = build_input(model, None, &services.store, ctx)?;
                let created = services
                    .remote
                    .create(model.entity_type, &input, ctx.validation)
                    .await?;
                persist_merge(services, model, &created, MergeScope::ReadOnly, ctx)?;

                info!("Created remote record {} for {}", created.id, model.entity_ref());
                Ok(Execution::Completed(SyncOutcome::new(
                    SyncAction::Created,
                    model,
                    Some(created.id),
                )))
            }
        }
    }
}
