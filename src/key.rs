//! Job and trigger identity
//!
//! A `Key` is the `(name, group)` pair that identifies a job or a trigger.
//! Job keys and trigger keys live in separate namespaces: the same pair may
//! name both a job and a trigger without conflict.

use crate::error::{Result, ScheduleError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Group label used when rendering a key without a group
pub const DEFAULT_GROUP: &str = "DEFAULT";

/// Identity of a job or trigger
///
/// Two keys are equal iff both name and group match. A `None` group is a
/// valid group of its own and never equals `Some("DEFAULT")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    /// Key name, unique within its group
    pub name: String,

    /// Optional group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

/// Identity of a job
pub type JobKey = Key;

/// Identity of a trigger
pub type TriggerKey = Key;

impl Key {
    /// Create a key in the given group
    pub fn new(name: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: Some(group.into()),
        }
    }

    /// Create a key without a group
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
        }
    }

    /// Create a key from an optional group
    pub fn with_group(name: impl Into<String>, group: Option<String>) -> Self {
        Self {
            name: name.into(),
            group,
        }
    }

    /// Create a key with a random, collision-improbable name and no group
    pub fn unique() -> Self {
        Self::named(uuid::Uuid::new_v4().to_string())
    }

    /// Group as a string slice, if any
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// Fail with `Validation` unless the name is non-empty
    ///
    /// `what` names the key in the error message (e.g. "job key").
    pub fn validate(&self, what: &str) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ScheduleError::Validation(format!(
                "{} name must not be empty",
                what
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group().unwrap_or(DEFAULT_GROUP), self.name)
    }
}

impl AsRef<Key> for Key {
    fn as_ref(&self) -> &Key {
        self
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::named(name)
    }
}

impl From<(&str, &str)> for Key {
    fn from((name, group): (&str, &str)) -> Self {
        Key::new(name, group)
    }
}

/// Selects keys by their group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op", content = "value")]
pub enum GroupMatcher {
    /// Group equals the given value (`None` matches the ungrouped keys)
    Equals(Option<String>),
    /// Group starts with the given prefix
    StartsWith(String),
    /// Group ends with the given suffix
    EndsWith(String),
    /// Group contains the given text
    Contains(String),
    /// Every group, including the ungrouped keys
    Any,
}

impl GroupMatcher {
    /// Match a single named group
    pub fn group_equals(group: impl Into<String>) -> Self {
        GroupMatcher::Equals(Some(group.into()))
    }

    /// Check a group against this matcher
    pub fn matches_group(&self, group: Option<&str>) -> bool {
        match (self, group) {
            (GroupMatcher::Any, _) => true,
            (GroupMatcher::Equals(expected), actual) => expected.as_deref() == actual,
            (_, None) => false,
            (GroupMatcher::StartsWith(prefix), Some(g)) => g.starts_with(prefix.as_str()),
            (GroupMatcher::EndsWith(suffix), Some(g)) => g.ends_with(suffix.as_str()),
            (GroupMatcher::Contains(part), Some(g)) => g.contains(part.as_str()),
        }
    }

    /// Check a key's group against this matcher
    pub fn matches(&self, key: &Key) -> bool {
        self.matches_group(key.group())
    }
}
