use crate::mapping_for;
use crmsync_types::{BusinessUnitId, EntityId, EntityRef, EntityType, RemoteId, UserId};
use serde::{Deserialize, Serialize};

/// Current wall time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A local CRM record.
///
/// Business fields live in `data` as JSON; the columns the sync engine reasons
/// about (ownership, business unit, remote link, version) are typed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub data: serde_json::Value,
    pub owner_id: Option<UserId>,
    pub business_unit_id: Option<BusinessUnitId>,
    /// Id of the counterpart in the remote CRM, once correlated or created.
    pub remote_id: Option<RemoteId>,
    /// Optimistic concurrency version; 0 until first persisted.
    pub version: i64,
    pub created_at: i64,
    pub modified_at: i64,
    /// Causer of the last modification, as rendered by `Causer`'s `Display`.
    pub modified_by: Option<String>,
}

impl Entity {
    /// Creates a new, unpersisted entity.
    pub fn new(entity_type: EntityType, data: serde_json::Value) -> Self {
        let now = now_millis();
        Self {
            id: EntityId::new(),
            entity_type,
            data,
            owner_id: None,
            business_unit_id: None,
            remote_id: None,
            version: 0,
            created_at: now,
            modified_at: now,
            modified_by: None,
        }
    }

    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.owner_id = Some(owner);
        self
    }

    pub fn in_business_unit(mut self, unit: BusinessUnitId) -> Self {
        self.business_unit_id = Some(unit);
        self
    }

    pub fn linked_to(mut self, remote_id: impl Into<RemoteId>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    /// Typed reference to this entity.
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.entity_type, self.id)
    }

    /// Human-readable name, taken from the type's mapped name field.
    pub fn display_name(&self) -> Option<&str> {
        self.get_str(mapping_for(self.entity_type).name_field)
    }

    /// Extract a string value from `data` using a JSON pointer (e.g., "/name").
    pub fn get_str(&self, pointer: &str) -> Option<&str> {
        self.data.pointer(pointer).and_then(|v| v.as_str())
    }

    /// Extract a boolean value from `data` using a JSON pointer.
    pub fn get_bool(&self, pointer: &str) -> Option<bool> {
        self.data.pointer(pointer).and_then(|v| v.as_bool())
    }

    /// Extract a numeric value from `data` using a JSON pointer.
    pub fn get_number(&self, pointer: &str) -> Option<f64> {
        self.data.pointer(pointer).and_then(|v| v.as_f64())
    }

    /// Extract a local entity reference stored as a UUID string.
    pub fn get_entity_id(&self, pointer: &str) -> Option<EntityId> {
        self.get_str(pointer).and_then(|s| EntityId::parse(s).ok())
    }

    /// Sets a top-level key in `data`, turning `data` into an object if needed.
    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        if !self.data.is_object() {
            self.data = serde_json::Value::Object(Default::default());
        }
        if let Some(obj) = self.data.as_object_mut() {
            obj.insert(key.to_string(), value);
        }
    }
}
