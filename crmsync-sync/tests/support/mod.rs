#![allow(dead_code)]

use async_trait::async_trait;
use crmsync_model::{Attributes, Entity, RemoteRecord};
use crmsync_storage::EntityStore;
use crmsync_sync::{RemoteCrm, RemoteInput, SyncError, SyncResult, SyncServices};
use crmsync_types::{BusinessUnitId, EntityType, RemoteId, ValidationLevel};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory remote CRM recording every call.
#[derive(Default)]
pub struct FakeRemote {
    records: Mutex<HashMap<EntityType, Vec<RemoteRecord>>>,
    next_id: AtomicU64,
    calls: Mutex<Vec<String>>,
    failures: Mutex<VecDeque<SyncError>>,
    last_validation: Mutex<Option<ValidationLevel>>,
    last_input: Mutex<Option<Attributes>>,
    computed: Mutex<HashMap<EntityType, Attributes>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, record: RemoteRecord) {
        self.records
            .lock()
            .unwrap()
            .entry(record.entity_type)
            .or_default()
            .push(record);
    }

    pub fn record(&self, entity_type: EntityType, id: &str) -> Option<RemoteRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&entity_type)
            .and_then(|records| records.iter().find(|r| r.id.as_str() == id).cloned())
    }

    pub fn records(&self, entity_type: EntityType) -> Vec<RemoteRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&entity_type)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes the next call fail with `err` (queued, first in first out).
    pub fn fail_next(&self, err: SyncError) {
        self.failures.lock().unwrap().push_back(err);
    }

    /// Attributes the fake adds to every created or updated record of a type.
    pub fn compute(&self, entity_type: EntityType, attributes: Value) {
        if let Value::Object(map) = attributes {
            self.computed.lock().unwrap().insert(entity_type, map);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.starts_with(operation))
            .count()
    }

    pub fn last_validation(&self) -> Option<ValidationLevel> {
        *self.last_validation.lock().unwrap()
    }

    pub fn last_input(&self) -> Option<Attributes> {
        self.last_input.lock().unwrap().clone()
    }

    fn enter(&self, call: String) -> SyncResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn apply_computed(&self, entity_type: EntityType, attributes: &mut Attributes) {
        if let Some(computed) = self.computed.lock().unwrap().get(&entity_type) {
            for (k, v) in computed {
                attributes.insert(k.clone(), v.clone());
            }
        }
    }
}

fn matches_criteria(record: &RemoteRecord, criteria: &Attributes) -> bool {
    criteria.iter().all(|(key, expected)| match (record.attributes.get(key), expected) {
        (Some(Value::String(actual)), Value::String(expected)) => actual.eq_ignore_ascii_case(expected),
        (Some(actual), expected) => actual == expected,
        (None, _) => false,
    })
}

#[async_trait]
impl RemoteCrm for FakeRemote {
    async fn find(&self, entity_type: EntityType, id: &RemoteId) -> SyncResult<Option<RemoteRecord>> {
        self.enter(format!("find {entity_type} {id}"))?;
        Ok(self.record(entity_type, id.as_str()))
    }

    async fn search(&self, entity_type: EntityType, criteria: &Attributes) -> SyncResult<Vec<RemoteRecord>> {
        self.enter(format!("search {entity_type}"))?;
        Ok(self
            .records(entity_type)
            .into_iter()
            .filter(|r| matches_criteria(r, criteria))
            .collect())
    }

    async fn create(
        &self,
        entity_type: EntityType,
        input: &RemoteInput,
        validation: ValidationLevel,
    ) -> SyncResult<RemoteRecord> {
        self.enter(format!("create {entity_type}"))?;
        *self.last_validation.lock().unwrap() = Some(validation);
        *self.last_input.lock().unwrap() = Some(input.to_attributes());

        let id = format!("r{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut attributes = input.to_attributes();
        self.apply_computed(entity_type, &mut attributes);
        let record = RemoteRecord::new(id, entity_type, attributes);
        self.insert(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        entity_type: EntityType,
        id: &RemoteId,
        input: &RemoteInput,
        validation: ValidationLevel,
    ) -> SyncResult<RemoteRecord> {
        self.enter(format!("update {entity_type} {id}"))?;
        *self.last_validation.lock().unwrap() = Some(validation);
        *self.last_input.lock().unwrap() = Some(input.to_attributes());

        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&entity_type)
            .and_then(|rs| rs.iter_mut().find(|r| &r.id == id))
            .ok_or_else(|| SyncError::RemoteRejected {
                status: 404,
                message: format!("{id} not found"),
            })?;
        for (k, v) in input.to_attributes() {
            record.attributes.insert(k, v);
        }
        let mut updated = record.clone();
        drop(records);

        self.apply_computed(entity_type, &mut updated.attributes);
        Ok(updated)
    }
}

// ── Fixtures ─────────────────────────────────────────────────────

pub fn store() -> EntityStore {
    EntityStore::open_in_memory().unwrap()
}

pub fn services(remote: Arc<FakeRemote>, store: &EntityStore) -> Arc<SyncServices> {
    Arc::new(SyncServices::new(remote, store.clone()))
}

pub fn company(name: &str, unit: BusinessUnitId) -> Entity {
    Entity::new(EntityType::Company, json!({ "name": name })).in_business_unit(unit)
}

pub fn contact(last_name: &str, email: &str) -> Entity {
    Entity::new(
        EntityType::Contact,
        json!({ "last_name": last_name, "email": email }),
    )
}

pub fn remote_company(id: &str, name: &str, unit: BusinessUnitId) -> RemoteRecord {
    RemoteRecord::new(
        id,
        EntityType::Company,
        attributes(json!({ "name": name, "business_unit_id": unit.to_string() })),
    )
}

pub fn attributes(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}
