//! Sync engine: wires store, remote client, strategies, skip rules, ledger and
//! ownership service together from an [`EngineConfig`].

use crate::config::EngineConfig;
use crate::context::SyncContext;
use crate::error::SyncResult;
use crate::ledger::SyncErrorLedger;
use crate::orchestrator::{SyncOrchestrator, SyncRunReport};
use crate::ownership::{
    standard_ownership_registry, ChangeOwnershipData, OwnershipPropagationService, OwnershipReport,
};
use crate::remote::http::HttpRemoteCrm;
use crate::remote::retry::RetryingRemote;
use crate::remote::RemoteCrm;
use crate::strategy::{pushable, standard_registry, SyncServices};
use crmsync_storage::{EntityStore, StorageError};
use crmsync_types::{Causer, Direction, EntityRef, EntityType, ValidationLevel};
use std::sync::Arc;
use tracing::info;

/// Pull order: reference data first so references resolve locally.
const PULL_ORDER: [EntityType; 8] = [
    EntityType::Currency,
    EntityType::Company,
    EntityType::Contact,
    EntityType::Opportunity,
    EntityType::Quote,
    EntityType::Task,
    EntityType::Appointment,
    EntityType::Product,
];

/// The assembled sync engine.
pub struct SyncEngine {
    store: EntityStore,
    orchestrator: SyncOrchestrator,
    ownership: OwnershipPropagationService,
    validation: ValidationLevel,
}

impl SyncEngine {
    /// Opens the configured store and ledger and talks HTTP to the remote CRM.
    pub fn from_config(config: &EngineConfig) -> SyncResult<Self> {
        let store = EntityStore::open(&config.store_path)?;
        let ledger = SyncErrorLedger::open(&config.ledger_path)?;
        let remote: Arc<dyn RemoteCrm> = Arc::new(HttpRemoteCrm::new(config.remote.clone())?);
        Self::with_remote(store, ledger, remote, config)
    }

    /// Builds an engine around an existing store, ledger and remote client.
    /// The remote is wrapped with the configured retry policy.
    pub fn with_remote(
        store: EntityStore,
        ledger: SyncErrorLedger,
        remote: Arc<dyn RemoteCrm>,
        config: &EngineConfig,
    ) -> SyncResult<Self> {
        let validation = config.validation_level()?;
        let skips = config.skip_options(&store)?;

        let remote: Arc<dyn RemoteCrm> = Arc::new(RetryingRemote::new(remote, config.retry));
        let services = Arc::new(SyncServices::new(remote, store.clone()));
        let orchestrator = SyncOrchestrator::new(Arc::new(standard_registry(services)), ledger)
            .with_skip_options(skips)
            .with_config(config.orchestrator);
        let ownership = OwnershipPropagationService::new(standard_ownership_registry(&store));

        info!(
            skip_rules = orchestrator.skip_options().len(),
            validation = validation.bits(),
            "Sync engine ready"
        );
        Ok(Self {
            store,
            orchestrator,
            ownership,
            validation,
        })
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn ledger(&self) -> &SyncErrorLedger {
        self.orchestrator.ledger()
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    /// A context for `causer` under the configured validation level.
    pub fn context(&self, causer: Causer) -> SyncContext {
        SyncContext::new(causer).with_validation(self.validation)
    }

    /// Syncs every stored entity of one type.
    pub async fn sync_type(
        &self,
        entity_type: EntityType,
        direction: Direction,
        causer: Causer,
    ) -> SyncResult<SyncRunReport> {
        let ctx = self.context(causer);
        self.orchestrator
            .run_type(&self.store, entity_type, direction, &ctx)
            .await
    }

    /// Pushes every pushable type, parents before children. All reports
    /// share one run id.
    pub async fn push_all(&self, causer: Causer) -> SyncResult<Vec<SyncRunReport>> {
        let ctx = self.context(causer);
        let mut reports = Vec::new();
        for entity_type in EntityType::ALL.into_iter().filter(|t| pushable(*t)) {
            reports.push(
                self.orchestrator
                    .run_type(&self.store, entity_type, Direction::Push, &ctx)
                    .await?,
            );
        }
        Ok(reports)
    }

    /// Pulls every type, reference data first. All reports share one run id.
    pub async fn pull_all(&self, causer: Causer) -> SyncResult<Vec<SyncRunReport>> {
        let ctx = self.context(causer);
        let mut reports = Vec::new();
        for entity_type in PULL_ORDER {
            reports.push(
                self.orchestrator
                    .run_type(&self.store, entity_type, Direction::Pull, &ctx)
                    .await?,
            );
        }
        Ok(reports)
    }

    /// Changes the owner of a stored entity.
    pub async fn change_ownership(
        &self,
        entity: &EntityRef,
        data: &ChangeOwnershipData,
        causer: Causer,
    ) -> SyncResult<OwnershipReport> {
        let model = self
            .store
            .get_ref(entity)?
            .ok_or_else(|| StorageError::NotFound(entity.to_string()))?;
        let ctx = self.context(causer);
        self.ownership.change_ownership(&model, data, &ctx).await
    }
}
