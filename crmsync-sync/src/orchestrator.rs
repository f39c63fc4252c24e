//! Sync run driver.
//!
//! For each entity: consult the skip rules, dispatch to the first applicable
//! strategy, then settle the ledger. Entity-level failures never abort the
//! run; only [`SyncError::Configuration`] does.
//!
//! ```text
//! Pending ─┬─> Skipped
//!          └─> Dispatched ─┬─> Succeeded   (active ledger row resolved)
//!                          └─> Failed      (ledger row recorded)
//! ```

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::ledger::SyncErrorLedger;
use crate::skip::SkipOptionCollection;
use crate::strategy::{SyncOutcome, SyncRegistry};
use crmsync_model::Entity;
use crmsync_storage::EntityStore;
use crmsync_types::{Direction, EntityRef, EntityType, Operation, StrategyKind};
use futures::{stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Orchestrator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Entities processed at once. 1 means strictly sequential.
    pub max_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self { max_concurrency: 1 }
    }
}

/// Where an entity ended up in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Pending,
    Skipped,
    Dispatched,
    Succeeded,
    Failed,
}

/// Per-entity line of a run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity: EntityRef,
    pub entity_name: Option<String>,
    pub state: EntityState,
    /// Name of the strategy that completed.
    pub strategy: Option<String>,
    pub outcome: Option<SyncOutcome>,
    pub error: Option<String>,
    /// Ledger row written for a failure.
    pub ledger_id: Option<i64>,
}

impl EntityReport {
    fn pending(entity: &Entity) -> Self {
        Self {
            entity: entity.entity_ref(),
            entity_name: entity.display_name().map(str::to_string),
            state: EntityState::Pending,
            strategy: None,
            outcome: None,
            error: None,
            ledger_id: None,
        }
    }
}

/// Summary of one sync run, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRunReport {
    pub run_id: Uuid,
    pub direction: Direction,
    /// Set when the run covered every stored entity of one type.
    #[serde(default)]
    pub entity_type: Option<EntityType>,
    pub entities: Vec<EntityReport>,
}

impl SyncRunReport {
    fn count(&self, state: EntityState) -> usize {
        self.entities.iter().filter(|e| e.state == state).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(EntityState::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(EntityState::Failed)
    }

    pub fn skipped(&self) -> usize {
        self.count(EntityState::Skipped)
    }

    pub fn total(&self) -> usize {
        self.entities.len()
    }

    /// The report line for `entity`, if it was part of the run.
    pub fn entity(&self, entity: &EntityRef) -> Option<&EntityReport> {
        self.entities.iter().find(|e| e.entity == *entity)
    }
}

/// Drives sync runs over sets of entities.
pub struct SyncOrchestrator {
    registry: Arc<SyncRegistry>,
    skips: SkipOptionCollection,
    ledger: SyncErrorLedger,
    config: OrchestratorConfig,
}

impl SyncOrchestrator {
    pub fn new(registry: Arc<SyncRegistry>, ledger: SyncErrorLedger) -> Self {
        Self {
            registry,
            skips: SkipOptionCollection::new(),
            ledger,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_skip_options(mut self, skips: SkipOptionCollection) -> Self {
        self.skips = skips;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn ledger(&self) -> &SyncErrorLedger {
        &self.ledger
    }

    pub fn skip_options(&self) -> &SkipOptionCollection {
        &self.skips
    }

    /// Syncs `entities` in `direction`.
    ///
    /// The report keeps the input order regardless of concurrency.
    pub async fn run(
        &self,
        entities: Vec<Entity>,
        direction: Direction,
        ctx: &SyncContext,
    ) -> SyncResult<SyncRunReport> {
        if self.registry.is_empty() {
            return Err(SyncError::Configuration("strategy registry is empty".to_string()));
        }

        let operation = Operation::from(direction);
        let span = info_span!(
            "sync_run",
            run_id = %ctx.run_id,
            %operation,
            causer = %ctx.causer,
            entities = entities.len()
        );

        async move {
            info!("Starting sync run");
            let concurrency = self.config.max_concurrency.max(1);

            let reports: Vec<EntityReport> = stream::iter(entities.iter())
                .map(|entity| self.sync_entity(entity, operation, ctx))
                .buffered(concurrency)
                .try_collect()
                .await?;

            let report = SyncRunReport {
                run_id: ctx.run_id,
                direction,
                entity_type: None,
                entities: reports,
            };
            info!(
                succeeded = report.succeeded(),
                failed = report.failed(),
                skipped = report.skipped(),
                "Sync run finished"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    /// Syncs every stored entity of one type.
    pub async fn run_type(
        &self,
        store: &EntityStore,
        entity_type: EntityType,
        direction: Direction,
        ctx: &SyncContext,
    ) -> SyncResult<SyncRunReport> {
        let entities = store.list_by_type(entity_type)?;
        debug!(count = entities.len(), "Loaded {entity_type} entities for sync");
        let mut report = self.run(entities, direction, ctx).await?;
        report.entity_type = Some(entity_type);
        Ok(report)
    }

    async fn sync_entity(
        &self,
        entity: &Entity,
        operation: Operation,
        ctx: &SyncContext,
    ) -> SyncResult<EntityReport> {
        let kind = StrategyKind::new(entity.entity_type, operation);
        let entity_ref = entity.entity_ref();
        let mut report = EntityReport::pending(entity);

        if self.skips.should_skip(&kind, entity) {
            debug!("Skipping {kind} for {entity_ref}");
            report.state = EntityState::Skipped;
            return Ok(report);
        }

        report.state = EntityState::Dispatched;
        let dispatched = self
            .registry
            .dispatch(entity, operation, |strategy| async move {
                strategy.execute(entity, ctx).await
            })
            .await;

        match dispatched {
            Ok(dispatched) => {
                debug!(strategy = dispatched.strategy.name(), "Synced {entity_ref}");
                report.state = EntityState::Succeeded;
                report.strategy = Some(dispatched.strategy.name().to_string());
                report.outcome = Some(dispatched.outcome);
                if let Err(err) = self.ledger.resolve_for_entity(&entity_ref) {
                    warn!(error = %err, "Failed to resolve ledger entry for {entity_ref}");
                }
            }
            Err(err @ SyncError::Configuration(_)) => return Err(err),
            Err(err) => {
                let message = err.to_string();
                warn!(error = %message, "Sync failed for {entity_ref}");
                report.state = EntityState::Failed;
                match self.ledger.record(&entity_ref, entity.display_name(), &message) {
                    Ok(record) => report.ledger_id = Some(record.id),
                    Err(ledger_err) => {
                        warn!(error = %ledger_err, "Failed to record sync error for {entity_ref}");
                    }
                }
                report.error = Some(message);
            }
        }

        Ok(report)
    }
}
