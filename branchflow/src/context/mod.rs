//! Ambient context consulted by the pipeline.
//!
//! The dependency registry is read-only from the pipeline's point of view;
//! it is consulted once per handler, no later than the first freeze.

mod registry;

pub use registry::{Dependency, DependencyKey, DependencyRegistry, InMemoryRegistry};

#[cfg(test)]
pub use registry::MockDependencyRegistry;
