use crmsync_types::{EntityType, RemoteId};
use serde::{Deserialize, Serialize};

/// Flat attribute map, keyed by remote attribute name.
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// A record as returned by the remote CRM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: RemoteId,
    pub entity_type: EntityType,
    #[serde(default)]
    pub attributes: Attributes,
}

impl RemoteRecord {
    pub fn new(id: impl Into<RemoteId>, entity_type: EntityType, attributes: Attributes) -> Self {
        Self {
            id: id.into(),
            entity_type,
            attributes,
        }
    }

    /// Returns an attribute, treating JSON `null` as absent.
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name).filter(|v| !v.is_null())
    }

    pub fn attribute_str(&self, name: &str) -> Option<&str> {
        self.attribute(name).and_then(|v| v.as_str())
    }
}
