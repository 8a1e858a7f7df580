//! Per-field resolution state for lazily filled character data
//!
//! A deferred field moves `Unset -> Resolving -> Resolved` and never leaves
//! `Resolved`. `Resolving` only exists in memory while a resolution is in
//! flight; persisted documents store `null` for both non-resolved states so a
//! crashed resolution is simply retried by the next session.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Unset,
    Resolving,
    Resolved(T),
}

impl<T> Resolution<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Resolved(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn is_resolving(&self) -> bool {
        matches!(self, Self::Resolving)
    }

    /// Mark as in flight; a resolved field is left untouched
    pub fn begin(&mut self) {
        if !self.is_resolved() {
            *self = Self::Resolving;
        }
    }

    /// Drop an in-flight marker after a failed resolution
    pub fn abandon(&mut self) {
        if self.is_resolving() {
            *self = Self::Unset;
        }
    }

    /// Cache a value unless one is already cached; returns the cached value
    pub fn settle(&mut self, value: T) -> &T {
        if !self.is_resolved() {
            *self = Self::Resolved(value);
        }
        match self {
            Self::Resolved(value) => value,
            _ => unreachable!("settled resolution is always resolved"),
        }
    }
}

impl<T> Default for Resolution<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> From<Option<T>> for Resolution<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Self::Resolved(value),
            None => Self::Unset,
        }
    }
}

impl<T: Serialize> Serialize for Resolution<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value().serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Resolution<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Resolution::from)
    }
}
