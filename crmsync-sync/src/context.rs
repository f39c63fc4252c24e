//! Per-invocation context passed explicitly to every strategy.

use crmsync_types::{Causer, ValidationLevel};
use uuid::Uuid;

/// Who is acting, under which validation level, in which run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncContext {
    /// Time-ordered id of the sync run (or business action).
    pub run_id: Uuid,
    /// Identity audit columns are attributed to.
    pub causer: Causer,
    /// Validation categories to skip.
    pub validation: ValidationLevel,
}

impl SyncContext {
    /// Creates a context with full validation.
    pub fn new(causer: Causer) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            causer,
            validation: ValidationLevel::FULL,
        }
    }

    pub fn with_validation(mut self, validation: ValidationLevel) -> Self {
        self.validation = validation;
        self
    }

    /// Rendering stored in `modified_by` columns.
    pub fn causer_label(&self) -> String {
        self.causer.to_string()
    }

    /// True if the given validation category should run.
    pub fn validates(&self, category: ValidationLevel) -> bool {
        !self.validation.skips(category)
    }
}
