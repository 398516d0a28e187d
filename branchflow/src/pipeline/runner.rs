//! Named pipeline wrapping a stage tree.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info_span, warn};
use uuid::Uuid;

use super::PipelineConfig;
use crate::context::{DependencyRegistry, InMemoryRegistry};
use crate::core::{ArgumentValue, Phase};
use crate::errors::BranchflowError;
use crate::observability::{RunSpanAttributes, SpanTimer};
use crate::stages::{Stage, StageSummary};

/// A named, frozen-once stage tree that can be replayed many times.
///
/// The tree is held behind an [`Arc`] so concurrent runs can share it. While
/// any run (or a handle from [`Pipeline::shared_root`]) holds the tree,
/// structural edits fail with [`BranchflowError::TopologyShared`].
pub struct Pipeline {
    name: String,
    root: Arc<Stage>,
    registry: Arc<dyn DependencyRegistry>,
    config: PipelineConfig,
}

impl Pipeline {
    /// Creates a pipeline around a root stage with an empty registry.
    #[must_use]
    pub fn new(name: impl Into<String>, root: Stage) -> Self {
        Self {
            name: name.into(),
            root: Arc::new(root),
            registry: Arc::new(InMemoryRegistry::new()),
            config: PipelineConfig::default(),
        }
    }

    /// Sets the registry used to inject dependencies on freeze.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<dyn DependencyRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Returns the root stage.
    #[must_use]
    pub fn root(&self) -> &Stage {
        &self.root
    }

    /// Returns the phase of the tree.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.root.phase()
    }

    /// Describes the tree.
    #[must_use]
    pub fn summary(&self) -> StageSummary {
        self.root.summary()
    }

    /// Returns a shared handle to the tree for replay on other threads.
    #[must_use]
    pub fn shared_root(&self) -> Arc<Stage> {
        Arc::clone(&self.root)
    }

    /// Edits the tree.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::TopologyShared`] if the tree is shared, or
    /// whatever `edit` returns.
    pub fn edit<R>(
        &mut self,
        edit: impl FnOnce(&mut Stage) -> Result<R, BranchflowError>,
    ) -> Result<R, BranchflowError> {
        edit(self.root_mut()?)
    }

    /// Validates the config, injects dependencies and freezes the tree.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::InvalidConfig`],
    /// [`BranchflowError::TopologyShared`] or any freeze failure.
    pub fn freeze(&mut self) -> Result<(), BranchflowError> {
        self.config.validate()?;
        let registry = Arc::clone(&self.registry);
        self.root_mut()?.freeze_with(registry.as_ref())?;

        if self.config.log_topology_on_freeze {
            match serde_json::to_string(&self.root.summary()) {
                Ok(topology) => debug!(pipeline = %self.name, topology = %topology, "Pipeline frozen"),
                Err(e) => warn!(pipeline = %self.name, error = %e, "Failed to serialize topology"),
            }
        }
        Ok(())
    }

    /// Runs the frozen tree once.
    ///
    /// # Errors
    ///
    /// See [`Stage::run`].
    pub fn run(&self, values: &[ArgumentValue]) -> Result<Vec<ArgumentValue>, BranchflowError> {
        replay(&self.name, &self.root, self.config.slow_run_warn_ms, values)
    }

    /// Replays the frozen tree once per input batch on the blocking pool.
    ///
    /// At most `max_concurrent_runs` runs are in flight at once. Results are
    /// returned in batch order; one failing batch does not affect the others.
    pub async fn run_concurrent(
        &self,
        batches: Vec<Vec<ArgumentValue>>,
    ) -> Vec<Result<Vec<ArgumentValue>, BranchflowError>> {
        let limit = self.config.max_concurrent_runs.max(1);
        let slow_run_warn_ms = self.config.slow_run_warn_ms;

        stream::iter(batches.into_iter().map(|values| {
            let root = Arc::clone(&self.root);
            let name = self.name.clone();
            async move {
                tokio::task::spawn_blocking(move || replay(&name, &root, slow_run_warn_ms, &values))
                    .await
                    .unwrap_or_else(|e| {
                        Err(BranchflowError::Internal(format!("run task failed: {e}")))
                    })
            }
        }))
        .buffered(limit)
        .collect()
        .await
    }

    fn root_mut(&mut self) -> Result<&mut Stage, BranchflowError> {
        Arc::get_mut(&mut self.root).ok_or(BranchflowError::TopologyShared)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("phase", &self.root.phase())
            .field("stages", &self.root.stage_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn replay(
    name: &str,
    root: &Stage,
    slow_run_warn_ms: Option<u64>,
    values: &[ArgumentValue],
) -> Result<Vec<ArgumentValue>, BranchflowError> {
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("pipeline_run", pipeline = %name, run_id = %run_id);
    let _entered = span.enter();

    let timer = SpanTimer::start(name);
    let attrs = RunSpanAttributes::new(name, &run_id, values.len());

    match root.run(values) {
        Ok(result) => {
            if let Some(threshold_ms) = slow_run_warn_ms {
                if timer.exceeded(threshold_ms) {
                    warn!(
                        duration_ms = timer.elapsed_ms(),
                        threshold_ms,
                        "Slow pipeline run"
                    );
                }
            }
            let attrs = attrs
                .with_output_arity(result.len())
                .with_duration_ms(timer.finish());
            debug!(attributes = ?attrs.to_otel_attributes(), "Pipeline run completed");
            Ok(result)
        }
        Err(err) => {
            let attrs = attrs
                .with_duration_ms(timer.finish())
                .with_error(err.to_string());
            error!(
                code = err.code(),
                attributes = ?attrs.to_otel_attributes(),
                "Pipeline run failed"
            );
            Err(err)
        }
    }
}
