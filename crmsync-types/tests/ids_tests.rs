use crmsync_types::{BusinessUnitId, EntityId, RemoteId, UserId};
use std::collections::HashSet;
use std::str::FromStr;

// ── EntityId ──────────────────────────────────────────────────────

#[test]
fn entity_id_new_is_unique() {
    let a = EntityId::new();
    let b = EntityId::new();
    assert_ne!(a, b);
}

#[test]
fn entity_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::now_v7();
    let id = EntityId::from_uuid(uuid);
    assert_eq!(id.as_uuid(), uuid);
}

#[test]
fn entity_id_display_and_parse() {
    let id = EntityId::new();
    let parsed = EntityId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn entity_id_parse_invalid() {
    assert!(EntityId::parse("not-a-uuid").is_err());
    assert!(EntityId::from_str("garbage").is_err());
}

#[test]
fn entity_id_hash_and_eq() {
    let id = EntityId::new();
    let mut set = HashSet::new();
    set.insert(id);
    set.insert(id);
    assert_eq!(set.len(), 1);
}

#[test]
fn entity_id_serializes_as_plain_string() {
    let id = EntityId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
}

// ── UserId / BusinessUnitId ───────────────────────────────────────

#[test]
fn user_id_from_str_roundtrip() {
    let id = UserId::new();
    let parsed: UserId = id.to_string().parse().unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn business_unit_ids_compare_by_value() {
    let uuid = uuid::Uuid::now_v7();
    assert_eq!(BusinessUnitId::from_uuid(uuid), BusinessUnitId::from_uuid(uuid));
    assert_ne!(BusinessUnitId::new(), BusinessUnitId::new());
}

// ── RemoteId ──────────────────────────────────────────────────────

#[test]
fn remote_id_is_opaque_string() {
    let id = RemoteId::new("ACC-001");
    assert_eq!(id.as_str(), "ACC-001");
    assert_eq!(id.to_string(), "ACC-001");
    assert_eq!(RemoteId::from("ACC-001"), id);
}

#[test]
fn remote_id_serialization_is_transparent() {
    let id = RemoteId::from("abc".to_string());
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    let parsed: RemoteId = serde_json::from_str("\"abc\"").unwrap();
    assert_eq!(parsed, id);
}
