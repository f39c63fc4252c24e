//! Push and pull strategies.
//!
//! Every syncable entity type gets two push variants and two pull variants,
//! registered in this order:
//!
//! | Key  | First                     | Fallback                        |
//! |------|---------------------------|---------------------------------|
//! | push | [`PushLinked`] (has id)   | [`PushUnlinked`] (correlate)    |
//! | pull | [`PullLinked`] (has id)   | [`PullCorrelated`] (correlate)  |
//!
//! The strategies are generic over entity type and driven by
//! [`crmsync_model::mapping`]. Currency is reference data owned by the remote
//! CRM and only has pull strategies.

mod pull;
mod push;
pub mod validate;

pub use pull::{PullCorrelated, PullLinked};
pub use push::{PushLinked, PushUnlinked};

use crate::context::SyncContext;
use crate::correlation::CorrelationChain;
use crate::error::{SyncError, SyncResult};
use crate::registry::{Execution, Strategy, StrategyRegistry};
use crate::remote::RemoteCrm;
use async_trait::async_trait;
use crmsync_model::{
    mapping_for, Attributes, Entity, RemoteRecord, BUSINESS_UNIT_ATTRIBUTE, EXTERNAL_REFERENCE,
    OWNER_ATTRIBUTE,
};
use crmsync_storage::EntityStore;
use crmsync_types::{EntityRef, EntityType, RemoteId, ValidationLevel};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Shared collaborators of the sync strategies.
#[derive(Clone)]
pub struct SyncServices {
    pub remote: Arc<dyn RemoteCrm>,
    pub store: EntityStore,
    pub correlation: Arc<CorrelationChain>,
}

impl SyncServices {
    pub fn new(remote: Arc<dyn RemoteCrm>, store: EntityStore) -> Self {
        Self {
            remote,
            store,
            correlation: Arc::new(CorrelationChain::standard()),
        }
    }

    pub fn with_correlation(mut self, chain: CorrelationChain) -> Self {
        self.correlation = Arc::new(chain);
        self
    }
}

/// What a completed sync strategy did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    /// A new remote record was created and linked.
    Created,
    /// An existing remote record was updated.
    Updated,
    /// Local data was refreshed from the remote record.
    Pulled,
    /// Nothing differed.
    Unchanged,
}

/// Result of a completed strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub action: SyncAction,
    pub entity: EntityRef,
    pub remote_id: Option<RemoteId>,
}

impl SyncOutcome {
    pub fn new(action: SyncAction, entity: &Entity, remote_id: Option<RemoteId>) -> Self {
        Self {
            action,
            entity: entity.entity_ref(),
            remote_id,
        }
    }
}

/// A push or pull strategy.
#[async_trait]
pub trait SyncStrategy: Strategy {
    async fn execute(&self, model: &Entity, ctx: &SyncContext) -> SyncResult<Execution<SyncOutcome>>;
}

/// Registry of sync strategies.
pub type SyncRegistry = StrategyRegistry<dyn SyncStrategy>;

/// Entity types whose records may be pushed.
pub fn pushable(entity_type: EntityType) -> bool {
    entity_type != EntityType::Currency
}

/// Registers the four generic strategies for every entity type.
pub fn standard_registry(services: Arc<SyncServices>) -> SyncRegistry {
    let mut registry = SyncRegistry::new();
    for entity_type in EntityType::ALL {
        if pushable(entity_type) {
            registry.register(Arc::new(PushLinked::new(entity_type, Arc::clone(&services))));
            registry.register(Arc::new(PushUnlinked::new(entity_type, Arc::clone(&services))));
        }
        registry.register(Arc::new(PullLinked::new(entity_type, Arc::clone(&services))));
        registry.register(Arc::new(PullCorrelated::new(entity_type, Arc::clone(&services))));
    }
    registry
}

// ── Shared helpers ───────────────────────────────────────────────

/// Remote-shaped representation of a local entity, used for correlation.
///
/// References are translated to remote ids where the target is linked and
/// left null otherwise.
pub fn local_attributes(model: &Entity, store: &EntityStore) -> SyncResult<Attributes> {
    let mut attributes = Attributes::new();

    for field in mapping_for(model.entity_type).fields {
        let Some(value) = model.data.get(field.local) else {
            continue;
        };
        let value = match (field.reference, value.as_str()) {
            (Some(_), Some(raw)) => {
                let target = match crmsync_types::EntityId::parse(raw) {
                    Ok(id) => store.get(&id)?,
                    Err(_) => None,
                };
                target
                    .and_then(|t| t.remote_id)
                    .map(|r| Value::String(r.as_str().to_string()))
                    .unwrap_or(Value::Null)
            }
            _ => value.clone(),
        };
        attributes.insert(field.remote.to_string(), value);
    }

    attributes.insert(EXTERNAL_REFERENCE.to_string(), Value::String(model.id.to_string()));
    attributes.insert(
        OWNER_ATTRIBUTE.to_string(),
        model.owner_id.map_or(Value::Null, |o| Value::String(o.to_string())),
    );
    attributes.insert(
        BUSINESS_UNIT_ATTRIBUTE.to_string(),
        model
            .business_unit_id
            .map_or(Value::Null, |b| Value::String(b.to_string())),
    );
    Ok(attributes)
}

/// Search criteria narrowing remote candidates, built from the mapping's
/// search keys. Keys missing locally are left out.
pub fn search_criteria(model: &Entity, local: &Attributes) -> Attributes {
    mapping_for(model.entity_type)
        .search_keys
        .iter()
        .filter_map(|key| {
            local
                .get(*key)
                .filter(|v| !v.is_null())
                .map(|v| (key.to_string(), v.clone()))
        })
        .collect()
}

/// Candidate remote records for correlation. Without any search criterion
/// there is nothing to search by, and correlation reports the missing key.
pub async fn find_candidates(
    services: &SyncServices,
    model: &Entity,
    local: &Attributes,
) -> SyncResult<Vec<RemoteRecord>> {
    let criteria = search_criteria(model, local);
    if criteria.is_empty() {
        return Ok(Vec::new());
    }
    services.remote.search(model.entity_type, &criteria).await
}

/// Which mapped fields to copy from a remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeScope {
    /// Every mapped field.
    All,
    /// Only fields the remote CRM computes.
    ReadOnly,
}

/// Copies mapped attributes from `remote` into `model.data`.
///
/// Remote references are translated to local entity ids; an unknown reference
/// fails unless relationship validation is skipped, in which case it is
/// ignored. Returns true if anything changed.
pub fn merge_remote(
    model: &mut Entity,
    remote: &RemoteRecord,
    scope: MergeScope,
    store: &EntityStore,
    ctx: &SyncContext,
) -> SyncResult<bool> {
    let mut changed = false;

    for field in mapping_for(model.entity_type).fields {
        if scope == MergeScope::ReadOnly && !field.read_only {
            continue;
        }
        let Some(value) = remote.attributes.get(field.remote) else {
            continue;
        };

        let value = match (field.reference, value.as_str()) {
            (Some(target_type), Some(raw)) => {
                match store.find_by_remote_id(target_type, &RemoteId::new(raw))? {
                    Some(target) => Value::String(target.id.to_string()),
                    None if ctx.validates(ValidationLevel::SKIP_RELATIONSHIP_VALIDATION) => {
                        return Err(SyncError::Validation(format!(
                            "{}: remote '{}' references unknown {target_type} {raw}",
                            model.entity_ref(),
                            field.remote
                        )));
                    }
                    None => continue,
                }
            }
            _ => value.clone(),
        };

        if model.data.get(field.local) != Some(&value) {
            model.set(field.local, value);
            changed = true;
        }
    }

    Ok(changed)
}

/// Declines with a reason naming the entity.
pub(crate) fn decline<T>(model: &Entity, reason: impl std::fmt::Display) -> SyncResult<Execution<T>> {
    Ok(Execution::unsupported(format!("{}: {reason}", model.entity_ref())))
}

/// Links `model` to `remote`, merges `scope` fields and stores the result if
/// anything changed. Returns true if mapped data changed.
pub(crate) fn persist_merge(
    services: &SyncServices,
    model: &Entity,
    remote: &RemoteRecord,
    scope: MergeScope,
    ctx: &SyncContext,
) -> SyncResult<bool> {
    let mut updated = model.clone();
    let relinked = updated.remote_id.as_ref() != Some(&remote.id);
    updated.remote_id = Some(remote.id.clone());

    let merged = merge_remote(&mut updated, remote, scope, &services.store, ctx)?;
    if relinked || merged {
        services.store.update(&updated, &ctx.causer_label())?;
    }
    Ok(merged)
}
