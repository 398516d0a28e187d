//! Stage trees.
//!
//! A [`Stage`] pairs one handler with zero or more attached [`StageStep`]s.
//! Each step fans the stage's output out to its sibling stages and
//! concatenates their results, which become the input of the next step.

mod path;
mod stage;
mod step;

pub use path::{PathSegment, StagePath};
pub use stage::{Stage, StageSummary};
pub use step::StageStep;
