//! Validation levels carried by sync and ownership-change invocations.

use crate::Error;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// A set of validation categories to skip.
    ///
    /// The empty set is [`ValidationLevel::FULL`]. `SKIP_ALL` is not a
    /// separate bit: it is the union of every other flag, so checking any
    /// single category against it behaves like checking that category.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ValidationLevel: u16 {
        const SKIP_UNCHANGED_FIELDS = 1 << 0;
        const SKIP_USER_DEFINED_VALIDATIONS = 1 << 1;
        const SKIP_READONLY_VALIDATION = 1 << 2;
        const SKIP_RELATIONSHIP_VALIDATION = 1 << 3;
        const SKIP_FIELD_VALUE_VALIDATION = 1 << 4;
        const SKIP_INVALID_RECALCULATIONS = 1 << 5;
        const SKIP_STEP_CHECKLIST_VALIDATION = 1 << 6;
        const SKIP_RECALCULATION = 1 << 7;

        const SKIP_ALL = Self::SKIP_UNCHANGED_FIELDS.bits()
            | Self::SKIP_USER_DEFINED_VALIDATIONS.bits()
            | Self::SKIP_READONLY_VALIDATION.bits()
            | Self::SKIP_RELATIONSHIP_VALIDATION.bits()
            | Self::SKIP_FIELD_VALUE_VALIDATION.bits()
            | Self::SKIP_INVALID_RECALCULATIONS.bits()
            | Self::SKIP_STEP_CHECKLIST_VALIDATION.bits()
            | Self::SKIP_RECALCULATION.bits();
    }
}

impl ValidationLevel {
    /// Run every validation.
    pub const FULL: Self = Self::empty();

    /// Builds a level from flag names such as `"SKIP_ALL"` or `"FULL"`.
    pub fn from_names<I, S>(names: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut level = Self::FULL;
        for name in names {
            let name = name.as_ref();
            if name == "FULL" {
                continue;
            }
            let flag = Self::from_name(name)
                .ok_or_else(|| Error::UnknownValidationFlag(name.to_string()))?;
            level |= flag;
        }
        Ok(level)
    }

    /// Returns true if the given category should be skipped.
    pub fn skips(&self, category: ValidationLevel) -> bool {
        !category.is_empty() && self.contains(category)
    }

    /// Returns true if nothing is skipped.
    pub fn is_full(&self) -> bool {
        self.is_empty()
    }
}
