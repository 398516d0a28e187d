//! Contract validation between stages.
//!
//! This module provides the argument validator: the structural gate that keeps
//! an inconsistent topology from ever reaching the processing phase.

mod validator;

pub use validator::{is_compatible, validate, validate_values};
