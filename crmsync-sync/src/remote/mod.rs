//! Remote CRM abstraction.
//!
//! [`RemoteCrm`] is the only way strategies reach the remote system. The HTTP
//! implementation lives in [`http`]; [`retry`] wraps any implementation with
//! timeouts and bounded exponential backoff.

pub mod http;
pub mod retry;

use crate::error::SyncResult;
use async_trait::async_trait;
use crmsync_model::{Attributes, RemoteRecord};
use crmsync_types::{EntityType, Field, RemoteId, ValidationLevel};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Attribute payload for a create or update call.
///
/// Each attribute is tri-state: [`Field::Miss`] is left out of the request
/// entirely, [`Field::Null`] clears it remotely, [`Field::Value`] sets it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteInput {
    fields: BTreeMap<String, Field<Value>>,
}

impl RemoteInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: Field<Value>) {
        self.fields.insert(name.into(), value);
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: Field<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Field<Value>> {
        self.fields.get(name)
    }

    /// Marks an attribute as not sent.
    pub fn omit(&mut self, name: &str) {
        if let Some(field) = self.fields.get_mut(name) {
            *field = Field::Miss;
        }
    }

    /// Attributes that will actually be sent.
    pub fn sent(&self) -> impl Iterator<Item = (&str, &Field<Value>)> {
        self.fields
            .iter()
            .filter(|(_, f)| !f.is_miss())
            .map(|(k, f)| (k.as_str(), f))
    }

    /// Number of attributes that will be sent.
    pub fn len(&self) -> usize {
        self.sent().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sent attributes as a flat map, with nulls kept explicit.
    pub fn to_attributes(&self) -> Attributes {
        self.sent()
            .map(|(k, f)| (k.to_string(), f.value().cloned().unwrap_or(Value::Null)))
            .collect()
    }
}

impl Serialize for RemoteInput {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, field) in self.sent() {
            map.serialize_entry(name, field)?;
        }
        map.end()
    }
}

/// Operations the sync engine needs from the remote CRM.
#[async_trait]
pub trait RemoteCrm: Send + Sync {
    /// Fetches one record; `None` when the remote id no longer exists.
    async fn find(&self, entity_type: EntityType, id: &RemoteId) -> SyncResult<Option<RemoteRecord>>;

    /// Returns records whose attributes equal every given criterion. String
    /// criteria compare case-insensitively.
    async fn search(&self, entity_type: EntityType, criteria: &Attributes) -> SyncResult<Vec<RemoteRecord>>;

    /// Creates a record under the given validation level.
    async fn create(
        &self,
        entity_type: EntityType,
        input: &RemoteInput,
        validation: ValidationLevel,
    ) -> SyncResult<RemoteRecord>;

    /// Partially updates a record; omitted attributes stay untouched.
    async fn update(
        &self,
        entity_type: EntityType,
        id: &RemoteId,
        input: &RemoteInput,
        validation: ValidationLevel,
    ) -> SyncResult<RemoteRecord>;
}
