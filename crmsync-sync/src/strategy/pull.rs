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
use tracing::info;

/// Refreshes a linked entity from its remote record.
pub struct PullLinked {
    entity_type: EntityType,
    services: Arc<SyncServices>,
}

impl PullLinked {
    pub fn new(entity_type: EntityType, services: Arc<SyncServices>) -> Self {
        Self {
            entity_type,
            services,
        }
    }
}

impl Strategy for PullLinked {
    fn name(&self) -> &'static str {
        "pull_linked"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::pull(self.entity_type)
    }

    fn applies(&self, model: &Entity) -> bool {
        model.entity_type == self.entity_type && model.remote_id.is_some()
    }
}

#[async_trait]
impl SyncStrategy for PullLinked {
    async fn execute(&self, model: &Entity, ctx: &SyncContext) -> SyncResult<Execution<SyncOutcome>> {
        let Some(remote_id) = model.remote_id.as_ref() else {
            return decline(model, "not linked to a remote record");
        };
        let Some(record) = self.services.remote.find(model.entity_type, remote_id).await? else {
            return decline(model, format!("remote record {remote_id} no longer exists"));
        };

        let changed = persist_merge(&self.services, model, &record, MergeScope::All, ctx)?;
        let action = if changed {
            info!("Pulled {} from {}", model.entity_ref(), record.id);
            SyncAction::Pulled
        } else {
            SyncAction::Unchanged
        };
        Ok(Execution::Completed(SyncOutcome::new(action, model, Some(record.id))))
    }
}

/// Finds the remote counterpart of an unlinked entity by correlation, links
/// it and pulls its data. Declines when no counterpart exists.
pub struct PullCorrelated {
    entity_type: EntityType,
    services: Arc<SyncServices>,
}

impl PullCorrelated {
    pub fn new(entity_type: EntityType, services: Arc<SyncServices>) -> Self {
        Self {
            entity_type,
            services,
        }
    }
}

impl Strategy for PullCorrelated {
    fn name(&self) -> &'static str {
        "pull_correlated"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::pull(self.entity_type)
    }

    fn applies(&self, model: &Entity) -> bool {
        model.entity_type == self.entity_type && model.remote_id.is_none()
    }
}

#[async_trait]
impl SyncStrategy for PullCorrelated {
    async fn execute(&self, model: &Entity, ctx: &SyncContext) -> SyncResult<Execution<SyncOutcome>> {
        let local = local_attributes(model, &self.services.store)?;
        let candidates = find_candidates(&self.services, model, &local).await?;

        match self.services.correlation.resolve(&self.kind(), &local, &candidates)? {
            Correlation::Matched(record) => {
                persist_merge(&self.services, model, &record, MergeScope::All, ctx)?;
                info!("Linked and pulled {} from {}", model.entity_ref(), record.id);
                Ok(Execution::Completed(SyncOutcome::new(
                    SyncAction::Pulled,
                    model,
                    Some(record.id),
                )))
            }
            Correlation::NotFound => decline(model, "no remote counterpart to pull from"),
        }
    }
}
