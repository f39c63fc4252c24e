//! Local validation and payload construction for push strategies.
//!
//! Which checks run is decided by the [`ValidationLevel`] in the context:
//! - field values: required fields must be non-empty
//! - read-only: computed fields are never sent; setting one locally before the
//!   record exists remotely is an error
//! - relationships: referenced entities must exist locally and be linked remotely
//!
//! A skipped check degrades the offending attribute to [`Field::Miss`] instead
//! of failing.

use crate::context::SyncContext;
use crate::error::{SyncError, SyncResult};
use crate::remote::RemoteInput;
use crmsync_model::{
    mapping_for, Entity, FieldMapping, RemoteRecord, BUSINESS_UNIT_ATTRIBUTE, EXTERNAL_REFERENCE,
    OWNER_ATTRIBUTE,
};
use crmsync_storage::EntityStore;
use crmsync_types::{EntityId, Field, ValidationLevel};
use serde_json::Value;
use tracing::debug;

/// Builds the payload pushing `model` to the remote CRM.
///
/// `existing` is the current remote record when updating, `None` when creating.
pub fn build_input(
    model: &Entity,
    existing: Option<&RemoteRecord>,
    store: &EntityStore,
    ctx: &SyncContext,
) -> SyncResult<RemoteInput> {
    let mapping = mapping_for(model.entity_type);
    let mut input = RemoteInput::new();
    let mut problems = missing_required(model, ctx);

    for field in mapping.fields {
        let local = model.data.get(field.local);

        if field.read_only {
            if existing.is_none()
                && local.is_some_and(|v| !v.is_null())
                && ctx.validates(ValidationLevel::SKIP_READONLY_VALIDATION)
            {
                problems.push(format!("'{}' is read-only", field.local));
            }
            continue;
        }

        let value = match (local, field.reference) {
            (None, _) => Field::Miss,
            (Some(Value::Null), _) => Field::Null,
            (Some(value), Some(_)) => match resolve_reference(field, value, store, ctx)? {
                Reference::Resolved(remote_id) => Field::Value(Value::String(remote_id)),
                Reference::Dropped => Field::Miss,
                Reference::Invalid(problem) => {
                    problems.push(problem);
                    continue;
                }
            },
            (Some(value), None) => Field::Value(value.clone()),
        };
        input.set(field.remote, value);
    }

    if !problems.is_empty() {
        return Err(invalid(model, &problems));
    }

    input.set(EXTERNAL_REFERENCE, Field::Value(Value::String(model.id.to_string())));
    input.set(
        OWNER_ATTRIBUTE,
        model.owner_id.map(|o| Value::String(o.to_string())).into(),
    );
    input.set(
        BUSINESS_UNIT_ATTRIBUTE,
        model.business_unit_id.map(|b| Value::String(b.to_string())).into(),
    );

    if let Some(existing) = existing {
        if ctx.validation.skips(ValidationLevel::SKIP_UNCHANGED_FIELDS) {
            omit_unchanged(&mut input, existing);
        }
    }

    Ok(input)
}

/// Fails when a required field is blank, unless field-value validation is skipped.
///
/// Runs before correlation so a record lacking its business key is reported
/// as invalid data instead of reaching the resolver.
pub fn check_required(model: &Entity, ctx: &SyncContext) -> SyncResult<()> {
    let problems = missing_required(model, ctx);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(invalid(model, &problems))
    }
}

fn missing_required(model: &Entity, ctx: &SyncContext) -> Vec<String> {
    if !ctx.validates(ValidationLevel::SKIP_FIELD_VALUE_VALIDATION) {
        return Vec::new();
    }
    mapping_for(model.entity_type)
        .fields
        .iter()
        .filter(|f| f.required && is_blank(model.data.get(f.local)))
        .map(|f| format!("'{}' is required", f.local))
        .collect()
}

fn invalid(model: &Entity, problems: &[String]) -> SyncError {
    SyncError::Validation(format!("{}: {}", model.entity_ref(), problems.join("; ")))
}

enum Reference {
    Resolved(String),
    Invalid(String),
    Dropped,
}

/// Maps a local reference to the target's remote id. When relationship
/// validation is skipped, unresolvable references are left out of the payload.
fn resolve_reference(
    field: &FieldMapping,
    value: &Value,
    store: &EntityStore,
    ctx: &SyncContext,
) -> SyncResult<Reference> {
    let target = match value.as_str().and_then(|s| EntityId::parse(s).ok()) {
        Some(id) => store.get(&id)?,
        None => None,
    };

    Ok(match target.and_then(|t| t.remote_id) {
        Some(remote_id) => Reference::Resolved(remote_id.as_str().to_string()),
        None if ctx.validates(ValidationLevel::SKIP_RELATIONSHIP_VALIDATION) => {
            Reference::Invalid(format!(
                "'{}' references {} {value} which is not synchronized",
                field.local,
                field.reference.map(|t| t.as_str()).unwrap_or("entity"),
            ))
        }
        None => {
            debug!(field = field.local, "Dropping unresolved reference");
            Reference::Dropped
        }
    })
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Leaves out every attribute whose value already equals the remote one.
fn omit_unchanged(input: &mut RemoteInput, existing: &RemoteRecord) {
    let unchanged: Vec<String> = input
        .sent()
        .filter(|(name, field)| {
            let remote = existing.attribute(name);
            match field.value() {
                Some(value) => remote == Some(value),
                None => remote.is_none(),
            }
        })
        .map(|(name, _)| name.to_string())
        .collect();

    for name in unchanged {
        input.omit(&name);
    }
}
