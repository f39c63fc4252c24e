mod support;

use async_trait::async_trait;
use crmsync_model::Entity;
use crmsync_storage::EntityStore;
use crmsync_sync::{
    standard_ownership_registry, ChangeOwnershipData, EntityOwnershipStrategy, Execution,
    OwnershipPropagationService, OwnershipRegistry, OwnershipStrategy, Strategy, SyncContext,
    SyncError, SyncResult,
};
use crmsync_types::{BusinessUnitId, Causer, EntityId, EntityType, StrategyKind, UserId};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::{Arc, Mutex};
use support::{company, contact, store};

fn ctx() -> SyncContext {
    SyncContext::new(Causer::User(UserId::new()))
}

fn task(subject: &str) -> Entity {
    Entity::new(EntityType::Task, json!({ "subject": subject }))
}

fn owned(store: &EntityStore, entity: Entity, owner: UserId) -> Entity {
    store.insert(&entity.with_owner(owner)).unwrap()
}

fn owner_of(store: &EntityStore, id: &EntityId) -> Option<UserId> {
    store.get(id).unwrap().unwrap().owner_id
}

// ── Store-backed strategy ────────────────────────────────────────

#[tokio::test]
async fn without_transfer_only_primary_changes() {
    let store = store();
    let (alice, bob) = (UserId::new(), UserId::new());
    let acme = owned(&store, company("Acme", BusinessUnitId::new()), alice);
    let jane = owned(&store, contact("Doe", "jane@example.com"), alice);
    store.link(&acme.id, &jane.id).unwrap();

    let service = OwnershipPropagationService::new(standard_ownership_registry(&store));
    let report = service
        .change_ownership(&acme, &ChangeOwnershipData::new(bob), &ctx())
        .await
        .unwrap();

    assert_eq!(report.primary.owner_id, Some(bob));
    assert!(report.transferred.is_empty());
    assert_eq!(owner_of(&store, &acme.id), Some(bob));
    assert_eq!(owner_of(&store, &jane.id), Some(alice));
}

#[tokio::test]
async fn transfer_moves_direct_links_only() {
    let store = store();
    let (alice, bob) = (UserId::new(), UserId::new());
    let acme = owned(&store, company("Acme", BusinessUnitId::new()), alice);
    let jane = owned(&store, contact("Doe", "jane@example.com"), alice);
    let call = owned(&store, task("Call"), alice);
    let follow_up = owned(&store, task("Follow up"), alice);
    store.link(&acme.id, &jane.id).unwrap();
    store.link(&acme.id, &call.id).unwrap();
    store.link(&jane.id, &follow_up.id).unwrap();

    let service = OwnershipPropagationService::new(standard_ownership_registry(&store));
    let data = ChangeOwnershipData::new(bob).transfer_linked_records(true);
    let report = service.change_ownership(&acme, &data, &ctx()).await.unwrap();

    assert!(report.is_complete());
    assert_eq!(report.transferred, vec![jane.entity_ref(), call.entity_ref()]);
    assert_eq!(owner_of(&store, &jane.id), Some(bob));
    assert_eq!(owner_of(&store, &call.id), Some(bob));
    assert_eq!(owner_of(&store, &follow_up.id), Some(alice));
}

#[tokio::test]
async fn keeping_previous_owner_grants_editor_access() {
    let store = store();
    let (alice, bob) = (UserId::new(), UserId::new());
    let acme = owned(&store, company("Acme", BusinessUnitId::new()), alice);

    let service = OwnershipPropagationService::new(standard_ownership_registry(&store));
    let data = ChangeOwnershipData::new(bob).keep_original_owner_as_editor(true);
    service.change_ownership(&acme, &data, &ctx()).await.unwrap();

    assert_eq!(store.editors(&acme.id).unwrap(), vec![alice]);
}

#[tokio::test]
async fn already_owned_is_a_no_op() {
    let store = store();
    let alice = UserId::new();
    let acme = owned(&store, company("Acme", BusinessUnitId::new()), alice);

    let service = OwnershipPropagationService::new(standard_ownership_registry(&store));
    let report = service
        .change_ownership(&acme, &ChangeOwnershipData::new(alice), &ctx())
        .await
        .unwrap();

    assert_eq!(report.primary.version, acme.version);
    assert!(store.editors(&acme.id).unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_primary_is_an_error() {
    let store = store();
    let euro = store
        .insert(&Entity::new(EntityType::Currency, json!({ "iso_code": "EUR" })))
        .unwrap();

    let service = OwnershipPropagationService::new(standard_ownership_registry(&store));
    let err = service
        .change_ownership(&euro, &ChangeOwnershipData::new(UserId::new()), &ctx())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::UnsupportedModel { entity } if entity == euro.entity_ref()));
}

#[tokio::test]
async fn linked_failures_are_collected_and_the_rest_proceeds() {
    let store = store();
    let (alice, bob) = (UserId::new(), UserId::new());
    let acme = owned(&store, company("Acme", BusinessUnitId::new()), alice);
    let euro = store
        .insert(&Entity::new(EntityType::Currency, json!({ "iso_code": "EUR" })))
        .unwrap();
    let jane = owned(&store, contact("Doe", "jane@example.com"), alice);
    store.link(&acme.id, &euro.id).unwrap();
    store.link(&acme.id, &jane.id).unwrap();

    let registry: OwnershipRegistry = OwnershipRegistry::new()
        .with(Arc::new(
            EntityOwnershipStrategy::new(EntityType::Company, store.clone())
                .with_linked_types(vec![EntityType::Currency, EntityType::Contact]),
        ))
        .with(Arc::new(EntityOwnershipStrategy::new(EntityType::Contact, store.clone())));
    let service = OwnershipPropagationService::new(registry);

    let data = ChangeOwnershipData::new(bob).transfer_linked_records(true);
    let report = service.change_ownership(&acme, &data, &ctx()).await.unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].entity, euro.entity_ref());
    assert!(report.failures[0].error.contains("unsupported model"));
    assert_eq!(report.transferred, vec![jane.entity_ref()]);
    assert_eq!(owner_of(&store, &acme.id), Some(bob));
}

#[test]
fn standard_registry_covers_every_owned_type() {
    let registry = standard_ownership_registry(&store());
    for entity_type in EntityType::ALL {
        let kind = StrategyKind::change_ownership(entity_type);
        assert_eq!(registry.handles(&kind), entity_type != EntityType::Currency, "{entity_type}");
    }
}

// ── Cascade depth ────────────────────────────────────────────────

/// In-memory strategy that records every call and reports fixed links.
struct Counting {
    entity_type: EntityType,
    links: Vec<Entity>,
    calls: Arc<Mutex<Vec<EntityId>>>,
}

impl Strategy for Counting {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::change_ownership(self.entity_type)
    }
}

#[async_trait]
impl OwnershipStrategy for Counting {
    async fn change_owner(
        &self,
        model: &Entity,
        data: &ChangeOwnershipData,
        _ctx: &SyncContext,
    ) -> SyncResult<Execution<Entity>> {
        self.calls.lock().unwrap().push(model.id);
        Ok(Execution::Completed(model.clone().with_owner(data.new_owner_id)))
    }

    fn linked_models(&self, _model: &Entity) -> SyncResult<Vec<Entity>> {
        Ok(self.links.clone())
    }
}

#[tokio::test]
async fn each_direct_link_is_changed_exactly_once() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let acme = company("Acme", BusinessUnitId::new());
    let jane = contact("Doe", "jane@example.com");
    let call = task("Call");

    let registry: OwnershipRegistry = OwnershipRegistry::new()
        .with(Arc::new(Counting {
            entity_type: EntityType::Company,
            links: vec![jane.clone(), call.clone()],
            calls: Arc::clone(&calls),
        }))
        .with(Arc::new(Counting {
            entity_type: EntityType::Contact,
            links: vec![task("Never followed")],
            calls: Arc::clone(&calls),
        }))
        .with(Arc::new(Counting {
            entity_type: EntityType::Task,
            links: Vec::new(),
            calls: Arc::clone(&calls),
        }));
    let service = OwnershipPropagationService::new(registry);

    let data = ChangeOwnershipData::new(UserId::new()).transfer_linked_records(true);
    service.change_ownership(&acme, &data, &ctx()).await.unwrap();

    assert_eq!(*calls.lock().unwrap(), vec![acme.id, jane.id, call.id]);
}

#[tokio::test]
async fn no_transfer_never_asks_for_links() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let acme = company("Acme", BusinessUnitId::new());
    let registry: OwnershipRegistry = OwnershipRegistry::new()
        .with(Arc::new(Counting {
            entity_type: EntityType::Company,
            links: vec![contact("Doe", "jane@example.com")],
            calls: Arc::clone(&calls),
        }))
        .with(Arc::new(Counting {
            entity_type: EntityType::Contact,
            links: Vec::new(),
            calls: Arc::clone(&calls),
        }));

    OwnershipPropagationService::new(registry)
        .change_ownership(&acme, &ChangeOwnershipData::new(UserId::new()), &ctx())
        .await
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec![acme.id]);
}
