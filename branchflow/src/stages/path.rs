//! Addresses of stages inside a tree.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One hop down the tree: a step of the current stage, then a sibling in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathSegment {
    /// Index of the step in the stage's attach order.
    pub step: usize,
    /// Index of the sibling stage in the step.
    pub sibling: usize,
}

/// Address of a stage relative to the root of its tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StagePath {
    segments: Vec<PathSegment>,
}

impl StagePath {
    /// The root stage.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Descends into sibling `sibling` of step `step`.
    #[must_use]
    pub fn child(mut self, step: usize, sibling: usize) -> Self {
        self.segments.push(PathSegment { step, sibling });
        self
    }

    /// Returns the hops from the root.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns true if this addresses the root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the number of hops from the root.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for StagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("root")?;
        for segment in &self.segments {
            write!(f, "/{}.{}", segment.step, segment.sibling)?;
        }
        Ok(())
    }
}
