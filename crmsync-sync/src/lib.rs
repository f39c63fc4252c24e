//! Bidirectional sync engine between the local CRM store and a remote CRM.
//!
//! # Architecture
//!
//! Work is split into small pluggable parts, all keyed by
//! [`StrategyKind`](crmsync_types::StrategyKind) (`entity type × operation`):
//!
//! ## Components
//!
//! - **Skip rules**: operator-declared predicates suppressing strategies for
//!   some or all entities ([`SkipOption`], [`SkipOptionCollection`])
//! - **Registry**: ordered strategy candidates per key; a candidate that does
//!   not apply returns [`Execution::Unsupported`] and the next one is tried
//! - **Correlation**: business-key matching of local and remote records when no
//!   shared id exists yet ([`CorrelationChain`])
//! - **Strategies**: generic push/pull variants driven by the entity mappings
//! - **Ownership**: owner changes with one-level cascade to linked records,
//!   dispatched through the same registry
//! - **Ledger**: durable SQLite record of failed attempts ([`SyncErrorLedger`])
//! - **Orchestrator**: runs a batch, isolating failures per entity
//!
//! ## Sync Process
//!
//! 1. **Skip**: consult the skip rules for `(kind, entity)`
//! 2. **Dispatch**: first applicable strategy for the key completes
//! 3. **Correlate**: unlinked records are matched against remote candidates
//! 4. **Write**: update or create remotely, link and refresh locally
//! 5. **Settle**: failures go to the ledger, successes resolve it
//!
//! # Example
//!
//! ```
//! use crmsync_model::Entity;
//! use crmsync_sync::{SkipOption, SkipOptionCollection};
//! use crmsync_types::{EntityType, StrategyKind};
//! use serde_json::json;
//!
//! let company = Entity::new(EntityType::Company, json!({ "name": "Acme Corp" }));
//! let skips = SkipOptionCollection::new().with(
//!     SkipOption::for_strategy(StrategyKind::push(EntityType::Company))
//!         .for_entities([company.clone()]),
//! );
//!
//! assert!(skips.should_skip(&StrategyKind::push(EntityType::Company), &company));
//! assert!(skips.doesnt_imply(&StrategyKind::pull(EntityType::Company), &company));
//! ```

pub mod config;
mod context;
pub mod correlation;
mod engine;
mod error;
pub mod ledger;
pub mod orchestrator;
pub mod ownership;
pub mod registry;
pub mod remote;
pub mod skip;
pub mod strategy;

pub use config::EngineConfig;
pub use context::SyncContext;
pub use correlation::{
    CompanyCorrelationResolver, ContactCorrelationResolver, Correlation, CorrelationChain,
    CorrelationResolver, CurrencyCorrelationResolver, GenericCorrelationResolver,
};
pub use engine::SyncEngine;
pub use error::{Side, SyncError, SyncResult};
pub use ledger::{SyncErrorLedger, SyncErrorRecord};
pub use orchestrator::{
    EntityReport, EntityState, OrchestratorConfig, SyncOrchestrator, SyncRunReport,
};
pub use ownership::{
    default_linked_types, standard_ownership_registry, ChangeOwnershipData,
    EntityOwnershipStrategy, LinkedFailure, OwnershipPropagationService, OwnershipRegistry,
    OwnershipReport, OwnershipStrategy,
};
pub use registry::{Dispatched, Execution, Strategy, StrategyRegistry};
pub use remote::http::{HttpRemoteConfig, HttpRemoteCrm};
pub use remote::retry::{RetryPolicy, RetryingRemote};
pub use remote::{RemoteCrm, RemoteInput};
pub use skip::{SkipOption, SkipOptionCollection, SkipRuleConfig, StrategyPredicate};
pub use strategy::{
    standard_registry, SyncAction, SyncOutcome, SyncRegistry, SyncServices, SyncStrategy,
};
