//! Lifecycle phase of a stage tree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle phase of a stage.
///
/// A tree is edited in [`Phase::Building`] and executed in
/// [`Phase::Processing`]. Neither phase is terminal: any structural edit sends
/// the whole tree back to `Building`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Topology is mutable; only structural validation happens.
    Building,
    /// Topology is frozen; execution is permitted.
    Processing,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Building
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Building => write!(f, "BUILDING"),
            Self::Processing => write!(f, "PROCESSING"),
        }
    }
}

impl Phase {
    /// Returns true if the topology may be edited in this phase.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Building)
    }

    /// Returns true if the tree may be executed in this phase.
    #[must_use]
    pub fn is_executable(&self) -> bool {
        matches!(self, Self::Processing)
    }
}
