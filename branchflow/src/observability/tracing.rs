//! Span attributes and timing for stage tree runs.
//!
//! Attribute maps use OpenTelemetry-style dotted keys so they can be attached
//! to whatever exporter the host application runs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Span attributes for one pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSpanAttributes {
    /// Pipeline name.
    pub pipeline_name: String,
    /// Run ID.
    pub run_id: String,
    /// Number of values fed to the root.
    pub input_arity: usize,
    /// Number of values produced, once the run succeeded.
    pub output_arity: Option<usize>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Error message if the run failed.
    pub error: Option<String>,
}

impl RunSpanAttributes {
    /// Creates run span attributes.
    #[must_use]
    pub fn new(pipeline_name: impl Into<String>, run_id: impl Into<String>, input_arity: usize) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            run_id: run_id.into(),
            input_arity,
            ..Default::default()
        }
    }

    /// Sets the output arity.
    #[must_use]
    pub fn with_output_arity(mut self, arity: usize) -> Self {
        self.output_arity = Some(arity);
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the error.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Converts to OpenTelemetry attributes.
    #[must_use]
    pub fn to_otel_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();

        attrs.insert("pipeline.name".to_string(), self.pipeline_name.clone());
        attrs.insert("pipeline.run_id".to_string(), self.run_id.clone());
        attrs.insert("run.input_arity".to_string(), self.input_arity.to_string());

        if let Some(v) = self.output_arity {
            attrs.insert("run.output_arity".to_string(), v.to_string());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("run.duration_ms".to_string(), format!("{v:.3}"));
        }
        if let Some(ref v) = self.error {
            attrs.insert("run.error".to_string(), v.clone());
        }

        attrs
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns true once more than `threshold_ms` milliseconds have elapsed.
    #[must_use]
    pub fn exceeded(&self, threshold_ms: u64) -> bool {
        self.start.elapsed() > Duration::from_millis(threshold_ms)
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_attributes() {
        let attrs = RunSpanAttributes::new("orders", "run-1", 2)
            .with_output_arity(3)
            .with_duration_ms(1.5)
            .to_otel_attributes();

        assert_eq!(attrs.get("pipeline.name"), Some(&"orders".to_string()));
        assert_eq!(attrs.get("pipeline.run_id"), Some(&"run-1".to_string()));
        assert_eq!(attrs.get("run.input_arity"), Some(&"2".to_string()));
        assert_eq!(attrs.get("run.output_arity"), Some(&"3".to_string()));
        assert_eq!(attrs.get("run.duration_ms"), Some(&"1.500".to_string()));
        assert!(!attrs.contains_key("run.error"));
    }

    #[test]
    fn test_failure_attributes() {
        let attrs = RunSpanAttributes::new("orders", "run-2", 1)
            .with_error("boom")
            .to_otel_attributes();

        assert_eq!(attrs.get("run.error"), Some(&"boom".to_string()));
        assert!(!attrs.contains_key("run.output_arity"));
    }

    #[test]
    fn test_span_timer() {
        let timer = SpanTimer::start("run");
        assert_eq!(timer.name(), "run");
        assert!(!timer.exceeded(60_000));
        assert!(timer.finish() >= 0.0);
    }
}
