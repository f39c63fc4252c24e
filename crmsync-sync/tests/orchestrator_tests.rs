mod support;

use crmsync_model::Entity;
use crmsync_storage::EntityStore;
use crmsync_sync::{
    standard_registry, CorrelationChain, EntityState, OrchestratorConfig, SkipOption,
    SkipOptionCollection, SyncAction, SyncContext, SyncError, SyncErrorLedger, SyncOrchestrator,
    SyncRegistry, SyncServices,
};
use crmsync_types::{Causer, Direction, EntityType, StrategyKind};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use support::{services, store, FakeRemote};

fn product(store: &EntityStore, name: &str) -> Entity {
    store
        .insert(&Entity::new(EntityType::Product, json!({ "name": name })))
        .unwrap()
}

fn ctx() -> SyncContext {
    SyncContext::new(Causer::sync_job())
}

fn orchestrator(remote: &Arc<FakeRemote>, store: &EntityStore) -> SyncOrchestrator {
    let registry = standard_registry(services(remote.clone(), store));
    SyncOrchestrator::new(Arc::new(registry), SyncErrorLedger::open_in_memory().unwrap())
}

// ── Outcomes ─────────────────────────────────────────────────────

#[tokio::test]
async fn successful_push_reports_strategy_and_outcome() {
    let (remote, store) = (FakeRemote::new(), store());
    let widget = product(&store, "Widget");

    let report = orchestrator(&remote, &store)
        .run(vec![widget.clone()], Direction::Push, &ctx())
        .await
        .unwrap();

    let line = report.entity(&widget.entity_ref()).unwrap();
    assert_eq!(line.state, EntityState::Succeeded);
    assert_eq!(line.strategy.as_deref(), Some("push_unlinked"));
    assert_eq!(line.outcome.as_ref().map(|o| o.action), Some(SyncAction::Created));
    assert_eq!(line.entity_name.as_deref(), Some("Widget"));
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.entity_type, None);
}

#[tokio::test]
async fn failure_is_recorded_and_run_continues() {
    let (remote, store) = (FakeRemote::new(), store());
    let broken = product(&store, "Broken");
    let fine = product(&store, "Fine");
    remote.fail_next(SyncError::RemoteRejected {
        status: 400,
        message: "bad payload".into(),
    });

    let orchestrator = orchestrator(&remote, &store);
    let report = orchestrator
        .run(vec![broken.clone(), fine.clone()], Direction::Push, &ctx())
        .await
        .unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.succeeded(), 1);

    let line = report.entity(&broken.entity_ref()).unwrap();
    assert_eq!(line.state, EntityState::Failed);
    assert!(line.error.as_deref().unwrap().contains("bad payload"));

    let record = orchestrator.ledger().active_for(&broken.entity_ref()).unwrap().unwrap();
    assert_eq!(line.ledger_id, Some(record.id));
    assert_eq!(record.entity_name.as_deref(), Some("Broken"));
    assert_eq!(orchestrator.ledger().count_active().unwrap(), 1);
}

#[tokio::test]
async fn later_success_resolves_the_ledger_row() {
    let (remote, store) = (FakeRemote::new(), store());
    let widget = product(&store, "Widget");
    remote.fail_next(SyncError::RemoteRejected {
        status: 409,
        message: "locked".into(),
    });
    let orchestrator = orchestrator(&remote, &store);

    orchestrator.run(vec![widget.clone()], Direction::Push, &ctx()).await.unwrap();
    assert_eq!(orchestrator.ledger().count_active().unwrap(), 1);

    let widget = store.get(&widget.id).unwrap().unwrap();
    orchestrator.run(vec![widget.clone()], Direction::Push, &ctx()).await.unwrap();

    assert_eq!(orchestrator.ledger().count_active().unwrap(), 0);
    let all = orchestrator.ledger().list_all(10, 0).unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].resolved_at.is_some());
}

#[tokio::test]
async fn skipped_entity_touches_neither_remote_nor_ledger() {
    let (remote, store) = (FakeRemote::new(), store());
    let widget = product(&store, "Widget");
    let gadget = product(&store, "Gadget");
    let skips = SkipOptionCollection::new().with(
        SkipOption::for_strategy(StrategyKind::push(EntityType::Product)).for_entities([widget.clone()]),
    );

    let orchestrator = orchestrator(&remote, &store).with_skip_options(skips);
    let report = orchestrator
        .run(vec![widget.clone(), gadget.clone()], Direction::Push, &ctx())
        .await
        .unwrap();

    assert_eq!(report.entity(&widget.entity_ref()).unwrap().state, EntityState::Skipped);
    assert_eq!(report.entity(&gadget.entity_ref()).unwrap().state, EntityState::Succeeded);
    assert_eq!(remote.count("create"), 1);
    assert_eq!(orchestrator.ledger().count_active().unwrap(), 0);
}

#[tokio::test]
async fn no_applicable_strategy_is_an_entity_failure() {
    let (remote, store) = (FakeRemote::new(), store());
    let euro = store
        .insert(&Entity::new(EntityType::Currency, json!({ "iso_code": "EUR" })))
        .unwrap();

    let orchestrator = orchestrator(&remote, &store);
    let report = orchestrator.run(vec![euro.clone()], Direction::Pull, &ctx()).await.unwrap();

    assert_eq!(report.failed(), 1);
    assert!(orchestrator.ledger().active_for(&euro.entity_ref()).unwrap().is_some());
}

// ── Aborts ───────────────────────────────────────────────────────

#[tokio::test]
async fn empty_registry_is_configuration_error() {
    let orchestrator = SyncOrchestrator::new(
        Arc::new(SyncRegistry::new()),
        SyncErrorLedger::open_in_memory().unwrap(),
    );
    let err = orchestrator.run(Vec::new(), Direction::Push, &ctx()).await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
}

#[tokio::test]
async fn configuration_error_aborts_run() {
    let (remote, store) = (FakeRemote::new(), store());
    let widget = product(&store, "Widget");
    let services = SyncServices::new(remote.clone(), store.clone())
        .with_correlation(CorrelationChain::new(Vec::new()));
    let orchestrator = SyncOrchestrator::new(
        Arc::new(standard_registry(Arc::new(services))),
        SyncErrorLedger::open_in_memory().unwrap(),
    );

    let err = orchestrator.run(vec![widget], Direction::Push, &ctx()).await.unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
    assert_eq!(orchestrator.ledger().count_active().unwrap(), 0);
}

// ── Ordering ─────────────────────────────────────────────────────

#[tokio::test]
async fn concurrent_run_keeps_input_order() {
    let (remote, store) = (FakeRemote::new(), store());
    let products: Vec<Entity> = (0..10).map(|i| product(&store, &format!("P{i}"))).collect();

    let report = orchestrator(&remote, &store)
        .with_config(OrchestratorConfig { max_concurrency: 4 })
        .run(products.clone(), Direction::Push, &ctx())
        .await
        .unwrap();

    let order: Vec<_> = report.entities.iter().map(|e| e.entity).collect();
    let expected: Vec<_> = products.iter().map(Entity::entity_ref).collect();
    assert_eq!(order, expected);
    assert_eq!(report.succeeded(), 10);
}

#[tokio::test]
async fn run_type_syncs_every_stored_entity_of_that_type() {
    let (remote, store) = (FakeRemote::new(), store());
    product(&store, "A");
    product(&store, "B");
    store
        .insert(&Entity::new(EntityType::Task, json!({ "subject": "Not a product" })))
        .unwrap();

    let report = orchestrator(&remote, &store)
        .run_type(&store, EntityType::Product, Direction::Push, &ctx())
        .await
        .unwrap();

    assert_eq!(report.total(), 2);
    assert_eq!(report.direction, Direction::Push);
    assert_eq!(report.entity_type, Some(EntityType::Product));
    assert_eq!(remote.records(EntityType::Product).len(), 2);
    assert!(remote.records(EntityType::Task).is_empty());
}
