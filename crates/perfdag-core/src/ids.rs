//! Identifiers for execution units.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an execution unit as shown by the scheduler.
///
/// Identifiers are labels, not keys: two units may share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// `{prefix}_{name}`, the id of a benchmark inside a task group.
    pub fn prefixed(prefix: &str, name: &str) -> Self {
        Self(format!("{}_{}", prefix, name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
