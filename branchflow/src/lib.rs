//! # Branchflow
//!
//! Type-checked branching execution pipelines.
//!
//! Branchflow builds trees of processing stages whose wiring is validated
//! before any data flows:
//!
//! - **Contract validation**: every attached step is checked against the
//!   arity and types of the output it will receive
//! - **Branching**: a step fans one tuple out to sibling stages and
//!   concatenates their results
//! - **Two-phase lifecycle**: topology is edited while `BUILDING` and run only
//!   once frozen into `PROCESSING`
//! - **Structural handlers**: duplicate, swap and bridge resolve their output
//!   types from what actually reaches them
//! - **Concurrent replay**: a frozen tree can be run with many inputs at once
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use branchflow::prelude::*;
//!
//! let root = Stage::init(Parse::default())?
//!     .attach([Stage::init(Validate::default())?, Stage::duplicate()])?;
//!
//! let mut pipeline = Pipeline::new("orders", root);
//! pipeline.freeze()?;
//! let result = pipeline.run(&[ArgumentValue::new(raw_order)])?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod context;
pub mod contracts;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod pipeline;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::context::{DependencyRegistry, InMemoryRegistry};
    pub use crate::core::{ArgumentContract, ArgumentValue, HandlerOutput, MultiValue, Phase};
    pub use crate::errors::{BranchflowError, ContractErrorInfo, ContractMismatchError};
    pub use crate::handlers::{
        Handler, HandlerDescriptor, HandlerExecutor, InjectionPoint, OutputShape, SystemHandler,
    };
    pub use crate::pipeline::{Pipeline, PipelineConfig};
    pub use crate::stages::{Stage, StagePath, StageStep};
}
