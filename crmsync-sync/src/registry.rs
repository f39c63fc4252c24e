//! Strategy registration and dispatch.
//!
//! Strategies are keyed by [`StrategyKind`]. Several candidates may share a key;
//! they are tried in registration order. A candidate that does not apply to the
//! model, or that answers [`Execution::Unsupported`], hands over to the next one.
//! When every candidate declines, dispatch fails with
//! [`SyncError::NoApplicableStrategy`].

use crate::error::{SyncError, SyncResult};
use crmsync_model::Entity;
use crmsync_types::{Operation, StrategyKind};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace};

/// What a strategy did with a model.
#[derive(Debug, Clone, PartialEq)]
pub enum Execution<T> {
    /// The strategy handled the model.
    Completed(T),
    /// The strategy declined at run time; the reason is logged.
    Unsupported(String),
}

impl<T> Execution<T> {
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Execution::Unsupported(reason.into())
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Execution::Completed(_))
    }
}

/// Common surface of every registered strategy.
pub trait Strategy: Send + Sync {
    /// Stable name used in logs and run reports.
    fn name(&self) -> &'static str;

    /// The key this strategy is registered under.
    fn kind(&self) -> StrategyKind;

    /// Cheap pre-check before execution. Defaults to matching the entity type.
    fn applies(&self, model: &Entity) -> bool {
        model.entity_type == self.kind().entity_type
    }
}

/// The strategy that completed, and what it produced.
#[derive(Debug)]
pub struct Dispatched<S: ?Sized, T> {
    pub strategy: Arc<S>,
    pub outcome: T,
}

/// Ordered candidates per strategy kind.
pub struct StrategyRegistry<S: ?Sized> {
    candidates: HashMap<StrategyKind, Vec<Arc<S>>>,
}

impl<S: ?Sized> Default for StrategyRegistry<S> {
    fn default() -> Self {
        Self {
            candidates: HashMap::new(),
        }
    }
}

impl<S: Strategy + ?Sized> StrategyRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a candidate under its own kind.
    pub fn register(&mut self, strategy: Arc<S>) {
        let kind = strategy.kind();
        debug!(strategy = strategy.name(), "Registered strategy for {kind}");
        self.candidates.entry(kind).or_default().push(strategy);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, strategy: Arc<S>) -> Self {
        self.register(strategy);
        self
    }

    /// Candidates for `kind`, in registration order.
    pub fn candidates(&self, kind: &StrategyKind) -> &[Arc<S>] {
        self.candidates.get(kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// True if at least one candidate is registered for `kind`.
    pub fn handles(&self, kind: &StrategyKind) -> bool {
        !self.candidates(kind).is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.values().all(Vec::is_empty)
    }

    /// Total number of registered candidates.
    pub fn len(&self) -> usize {
        self.candidates.values().map(Vec::len).sum()
    }

    /// Runs the first candidate for `(model.entity_type, operation)` that
    /// applies and completes.
    ///
    /// Errors returned by `run` stop the dispatch immediately; only
    /// [`Execution::Unsupported`] falls through to the next candidate.
    pub async fn dispatch<T, F, Fut>(
        &self,
        model: &Entity,
        operation: Operation,
        mut run: F,
    ) -> SyncResult<Dispatched<S, T>>
    where
        F: FnMut(Arc<S>) -> Fut,
        Fut: Future<Output = SyncResult<Execution<T>>>,
    {
        let kind = StrategyKind::new(model.entity_type, operation);

        for strategy in self.candidates(&kind) {
            if !strategy.applies(model) {
                trace!(strategy = strategy.name(), "Strategy does not apply to {}", model.entity_ref());
                continue;
            }
            match run(Arc::clone(strategy)).await? {
                Execution::Completed(outcome) => {
                    return Ok(Dispatched {
                        strategy: Arc::clone(strategy),
                        outcome,
                    });
                }
                Execution::Unsupported(reason) => {
                    debug!(
                        strategy = strategy.name(),
                        reason = %reason,
                        "Strategy declined {}, trying next candidate",
                        model.entity_ref()
                    );
                }
            }
        }

        Err(SyncError::NoApplicableStrategy {
            entity: model.entity_ref(),
            kind,
        })
    }
}
