//! Observability utilities.

mod tracing;

pub use tracing::{RunSpanAttributes, SpanTimer};
