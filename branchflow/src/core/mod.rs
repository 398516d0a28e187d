//! Core domain model types for branchflow.
//!
//! This module contains the fundamental types used throughout the framework:
//! - The stage lifecycle phase
//! - Argument contracts and the values bound to them
//! - Main operation return shapes

mod contract;
mod phase;
mod value;

pub use contract::{format_contracts, ArgumentContract, ERASED_NAME};
pub use phase::Phase;
pub use value::{contracts_of, ArgumentValue, HandlerOutput, MultiValue};
