//! Named pipelines.
//!
//! This module provides:
//! - [`PipelineConfig`] for run limits and logging
//! - [`Pipeline`], which owns a stage tree, freezes it with a dependency
//!   registry and replays it, serially or concurrently

mod config;
#[cfg(test)]
mod integration_tests;
mod runner;

pub use config::PipelineConfig;
pub use runner::Pipeline;
