//! Tri-state field values for partial updates against the remote CRM.
//!
//! The remote API treats an omitted attribute ("leave unchanged") differently
//! from an explicit `null` ("clear it"), so `Option<T>` is not enough.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A field that is either omitted, explicitly null, or set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    /// Not sent at all.
    #[default]
    Miss,
    /// Sent as JSON `null`.
    Null,
    /// Sent with a value.
    Value(T),
}

impl<T> Field<T> {
    /// Returns true for [`Field::Miss`]. Use with `skip_serializing_if`.
    pub fn is_miss(&self) -> bool {
        matches!(self, Field::Miss)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Field::Null)
    }

    /// Returns the value, if one is set.
    pub fn value(&self) -> Option<&T> {
        match self {
            Field::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Maps the contained value, keeping `Miss` and `Null` as they are.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Field<U> {
        match self {
            Field::Miss => Field::Miss,
            Field::Null => Field::Null,
            Field::Value(v) => Field::Value(f(v)),
        }
    }
}

impl<T> From<Option<T>> for Field<T> {
    /// `None` becomes an explicit null, never a miss.
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Field::Value(v),
            None => Field::Null,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Field::Value(v) => v.serialize(serializer),
            Field::Miss | Field::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    /// A present key deserializes to `Null` or `Value`; an absent key falls
    /// back to `Default` (`Miss`) when the field is marked `#[serde(default)]`.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}
