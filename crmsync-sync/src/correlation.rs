//! Correlation of local records with remote records by business key.
//!
//! Resolvers are ordered most specific first; the first one that declares it can
//! serve a strategy kind is the only one consulted. A resolver whose key
//! attribute is missing on either side fails with
//! [`SyncError::CorrelationPrecondition`] rather than reporting "no match":
//! a missing key is a data contract violation, while `NotFound` means creating a
//! new remote record is the right move.

use crate::error::{Side, SyncError, SyncResult};
use crmsync_model::{Attributes, RemoteRecord, BUSINESS_UNIT_ATTRIBUTE, EXTERNAL_REFERENCE};
use crmsync_types::{EntityType, Operation, StrategyKind};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Result of correlating one local representation against remote candidates.
#[derive(Debug, Clone, PartialEq)]
pub enum Correlation {
    Matched(RemoteRecord),
    NotFound,
}

/// Matches a local representation against a remote one.
pub trait CorrelationResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this resolver serves strategies of `kind`.
    fn can_resolve_for(&self, kind: &StrategyKind) -> bool;

    /// Attributes that must be present (and non-null) on both sides.
    fn required_fields(&self) -> &'static [&'static str];

    /// Compares two representations already known to carry the required fields.
    fn compare(&self, local: &Attributes, remote: &Attributes) -> bool;

    /// Checks preconditions on both sides, then compares.
    fn matches(&self, local: &Attributes, remote: &Attributes) -> SyncResult<bool> {
        require_fields(self.name(), self.required_fields(), local, Side::Local)?;
        require_fields(self.name(), self.required_fields(), remote, Side::Remote)?;
        Ok(self.compare(local, remote))
    }
}

fn require_fields(
    resolver: &'static str,
    fields: &[&str],
    attributes: &Attributes,
    side: Side,
) -> SyncResult<()> {
    for field in fields {
        if attributes.get(*field).is_none_or(Value::is_null) {
            return Err(SyncError::CorrelationPrecondition {
                resolver,
                field: field.to_string(),
                side,
            });
        }
    }
    Ok(())
}

fn folded(value: Option<&Value>) -> Option<String> {
    value.map(|v| match v {
        Value::String(s) => s.to_lowercase(),
        other => other.to_string().to_lowercase(),
    })
}

fn applies_to_sync(kind: &StrategyKind, entity_type: EntityType) -> bool {
    kind.entity_type == entity_type && matches!(kind.operation, Operation::Push | Operation::Pull)
}

// ── Resolvers ────────────────────────────────────────────────────

/// Fallback resolver: both sides carry the local entity id as external reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericCorrelationResolver;

impl CorrelationResolver for GenericCorrelationResolver {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn can_resolve_for(&self, _kind: &StrategyKind) -> bool {
        true
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &[EXTERNAL_REFERENCE]
    }

    fn compare(&self, local: &Attributes, remote: &Attributes) -> bool {
        local.get(EXTERNAL_REFERENCE) == remote.get(EXTERNAL_REFERENCE)
    }
}

/// Companies match on case-insensitive name within the same business unit.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompanyCorrelationResolver;

impl CorrelationResolver for CompanyCorrelationResolver {
    fn name(&self) -> &'static str {
        "company"
    }

    fn can_resolve_for(&self, kind: &StrategyKind) -> bool {
        applies_to_sync(kind, EntityType::Company)
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["name", BUSINESS_UNIT_ATTRIBUTE]
    }

    fn compare(&self, local: &Attributes, remote: &Attributes) -> bool {
        local.get(BUSINESS_UNIT_ATTRIBUTE) == remote.get(BUSINESS_UNIT_ATTRIBUTE)
            && folded(local.get("name")) == folded(remote.get("name"))
    }
}

/// Contacts match on case-insensitive email.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactCorrelationResolver;

impl CorrelationResolver for ContactCorrelationResolver {
    fn name(&self) -> &'static str {
        "contact"
    }

    fn can_resolve_for(&self, kind: &StrategyKind) -> bool {
        applies_to_sync(kind, EntityType::Contact)
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["email"]
    }

    fn compare(&self, local: &Attributes, remote: &Attributes) -> bool {
        folded(local.get("email")) == folded(remote.get("email"))
    }
}

/// Currencies match on ISO code, ignoring case.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrencyCorrelationResolver;

impl CorrelationResolver for CurrencyCorrelationResolver {
    fn name(&self) -> &'static str {
        "currency"
    }

    fn can_resolve_for(&self, kind: &StrategyKind) -> bool {
        applies_to_sync(kind, EntityType::Currency)
    }

    fn required_fields(&self) -> &'static [&'static str] {
        &["code"]
    }

    fn compare(&self, local: &Attributes, remote: &Attributes) -> bool {
        folded(local.get("code")) == folded(remote.get("code"))
    }
}

// ── Chain ────────────────────────────────────────────────────────

/// Ordered resolver chain, most specific first.
#[derive(Clone)]
pub struct CorrelationChain {
    resolvers: Vec<Arc<dyn CorrelationResolver>>,
}

impl CorrelationChain {
    pub fn new(resolvers: Vec<Arc<dyn CorrelationResolver>>) -> Self {
        Self { resolvers }
    }

    /// Company, contact and currency resolvers, with the generic fallback last.
    pub fn standard() -> Self {
        Self::new(vec![
            Arc::new(CompanyCorrelationResolver),
            Arc::new(ContactCorrelationResolver),
            Arc::new(CurrencyCorrelationResolver),
            Arc::new(GenericCorrelationResolver),
        ])
    }

    /// The first resolver that serves `kind`.
    pub fn resolver_for(&self, kind: &StrategyKind) -> Option<&Arc<dyn CorrelationResolver>> {
        self.resolvers.iter().find(|r| r.can_resolve_for(kind))
    }

    /// Finds the remote counterpart of `local` among `candidates`.
    pub fn resolve(
        &self,
        kind: &StrategyKind,
        local: &Attributes,
        candidates: &[RemoteRecord],
    ) -> SyncResult<Correlation> {
        let resolver = self.resolver_for(kind).ok_or_else(|| {
            SyncError::Configuration(format!("no correlation resolver for {kind}"))
        })?;

        require_fields(resolver.name(), resolver.required_fields(), local, Side::Local)?;

        for candidate in candidates {
            if resolver.matches(local, &candidate.attributes)? {
                debug!(
                    resolver = resolver.name(),
                    remote_id = %candidate.id,
                    "Correlated {kind} with remote record"
                );
                return Ok(Correlation::Matched(candidate.clone()));
            }
        }

        debug!(
            resolver = resolver.name(),
            candidates = candidates.len(),
            "No remote counterpart for {kind}"
        );
        Ok(Correlation::NotFound)
    }
}

impl Default for CorrelationChain {
    fn default() -> Self {
        Self::standard()
    }
}
