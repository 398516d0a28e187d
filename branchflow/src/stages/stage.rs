//! Stage tree nodes and the build/run lifecycle.

use super::{StagePath, StageStep};
use crate::context::{DependencyRegistry, InMemoryRegistry};
use crate::contracts;
use crate::core::{format_contracts, ArgumentContract, ArgumentValue, Phase};
use crate::errors::BranchflowError;
use crate::handlers::{Handler, HandlerExecutor, SystemHandler};
use serde::Serialize;
use tracing::debug;

/// A node pairing one handler with zero or more attached branch steps.
///
/// A stage built with [`Stage::init`] is the root of its own tree. Attaching
/// steps keeps the tree in [`Phase::Building`]; [`Stage::freeze`] validates the
/// whole tree and moves it to [`Phase::Processing`], after which
/// [`Stage::run`] may be called any number of times, from any number of
/// threads.
///
/// Nested stages are only reachable mutably through the root, so every
/// structural edit resets the phase of the entire tree.
#[derive(Debug)]
pub struct Stage {
    executor: HandlerExecutor,
    main_inputs: Vec<ArgumentContract>,
    main_outputs: Vec<ArgumentContract>,
    current_outputs: Vec<ArgumentContract>,
    resolved_outputs: Option<Vec<ArgumentContract>>,
    steps: Vec<StageStep>,
    phase: Phase,
}

impl Stage {
    /// Creates a root stage for a user handler.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::MissingMainOperation`] if the handler
    /// declares no main operation.
    pub fn init<H: Handler>(handler: H) -> Result<Self, BranchflowError> {
        Ok(Self::from_executor(HandlerExecutor::of(handler)?))
    }

    /// Creates a root stage around an existing executor.
    #[must_use]
    pub fn from_executor(executor: HandlerExecutor) -> Self {
        let main_inputs = executor.input_contracts().to_vec();
        let main_outputs = executor.output_contracts().to_vec();
        Self {
            executor,
            main_inputs,
            current_outputs: main_outputs.clone(),
            main_outputs,
            resolved_outputs: None,
            steps: Vec::new(),
            phase: Phase::Building,
        }
    }

    /// Creates a stage for a structural handler.
    #[must_use]
    pub fn system(handler: SystemHandler) -> Self {
        Self::from_executor(HandlerExecutor::system(handler))
    }

    /// Creates a duplicate stage: `(a) -> (a, a)`.
    #[must_use]
    pub fn duplicate() -> Self {
        Self::system(SystemHandler::Duplicate)
    }

    /// Creates a swap stage: `(a, b) -> (b, a)`.
    #[must_use]
    pub fn swap() -> Self {
        Self::system(SystemHandler::Swap)
    }

    /// Creates a bridge stage: `(a) -> (a)`.
    #[must_use]
    pub fn bridge() -> Self {
        Self::system(SystemHandler::Bridge)
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.executor.name()
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the handler executor.
    #[must_use]
    pub fn executor(&self) -> &HandlerExecutor {
        &self.executor
    }

    /// Returns the contracts the handler accepts. Fixed at construction.
    #[must_use]
    pub fn main_input_contracts(&self) -> &[ArgumentContract] {
        &self.main_inputs
    }

    /// Returns the contracts the handler declares as outputs.
    #[must_use]
    pub fn main_output_contracts(&self) -> &[ArgumentContract] {
        &self.main_outputs
    }

    /// Returns the output contracts of the stage after its last step.
    #[must_use]
    pub fn current_output_contracts(&self) -> &[ArgumentContract] {
        &self.current_outputs
    }

    /// Returns the output contracts computed by the last
    /// [`Stage::resolve_mapped_contracts`], if any.
    #[must_use]
    pub fn resolved_output_contracts(&self) -> Option<&[ArgumentContract]> {
        self.resolved_outputs.as_deref()
    }

    /// Returns the attached steps in order.
    #[must_use]
    pub fn steps(&self) -> &[StageStep] {
        &self.steps
    }

    /// Returns the number of stages in this tree, including this one.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    /// Returns the stage at `path`, if there is one.
    #[must_use]
    pub fn stage_at(&self, path: &StagePath) -> Option<&Self> {
        let mut stage = self;
        for segment in path.segments() {
            stage = stage.steps.get(segment.step)?.stages().get(segment.sibling)?;
        }
        Some(stage)
    }

    /// Attaches a step made of `siblings` to this stage (builder form).
    ///
    /// # Errors
    ///
    /// See [`Stage::attach_step`].
    pub fn attach(mut self, siblings: impl IntoIterator<Item = Self>) -> Result<Self, BranchflowError> {
        self.attach_step(StageStep::new(siblings)?)?;
        Ok(self)
    }

    /// Attaches a step to this stage.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::PhaseViolation`] outside
    /// [`Phase::Building`] and [`BranchflowError::ContractMismatch`] if any
    /// sibling does not accept the current output contracts.
    pub fn attach_step(&mut self, step: StageStep) -> Result<&mut Self, BranchflowError> {
        self.attach_at(&StagePath::root(), step)?;
        Ok(self)
    }

    /// Attaches a step to the stage at `path` inside this tree.
    ///
    /// The new step is validated against the target's current outputs. The
    /// contracts of every ancestor are then recomputed and the steps after
    /// them re-validated; if that fails the attach is rolled back. On success
    /// the whole tree returns to [`Phase::Building`].
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::InvalidPath`],
    /// [`BranchflowError::PhaseViolation`] or
    /// [`BranchflowError::ContractMismatch`].
    pub fn attach_at(&mut self, path: &StagePath, step: StageStep) -> Result<(), BranchflowError> {
        let saved = if path.is_root() {
            Vec::new()
        } else {
            self.output_snapshot()
        };

        let target = self.stage_at_mut(path)?;
        target.whitelist_phases(&[Phase::Building])?;
        step.validate_input(&target.current_outputs, target.phase)?;

        target.current_outputs = step.combined_output();
        target.steps.push(step);
        let outputs = format_contracts(&target.current_outputs);
        let handler = target.name().to_string();

        if !path.is_root() {
            if let Err(err) = self.refresh_contracts() {
                if let Ok(target) = self.stage_at_mut(path) {
                    target.steps.pop();
                }
                self.restore_outputs(saved);
                return Err(err);
            }
        }

        self.update_phase(Phase::Building);
        debug!(
            handler = %handler,
            path = %path,
            outputs = %outputs,
            "Attached stage step"
        );
        Ok(())
    }

    /// Resolves the effective output contracts of this subtree.
    ///
    /// Structural handlers derive their outputs from `initial`, the contracts
    /// actually reaching this stage; each attached step is then re-validated
    /// against the resolved list and folded in. Calling this twice on an
    /// unchanged topology yields the same list.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::MeaninglessMapping`] for a structural
    /// handler fed erased contracts and [`BranchflowError::ContractMismatch`]
    /// if a step does not accept the resolved contracts.
    pub fn resolve_mapped_contracts(
        &mut self,
        initial: &[ArgumentContract],
    ) -> Result<Vec<ArgumentContract>, BranchflowError> {
        let mut mapped = self.executor.resolve_system_outputs(initial)?;
        for step in &mut self.steps {
            step.validate_input(&mapped, self.phase)?;
            mapped = step.remap(&mapped)?;
        }
        self.resolved_outputs = Some(mapped.clone());
        Ok(mapped)
    }

    /// Freezes the tree with no dependencies available.
    ///
    /// # Errors
    ///
    /// See [`Stage::freeze_with`].
    pub fn freeze(&mut self) -> Result<(), BranchflowError> {
        self.freeze_with(&InMemoryRegistry::new())
    }

    /// Injects dependencies, resolves mapped contracts from the root inputs
    /// and moves the whole tree to [`Phase::Processing`].
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::InjectionFailure`],
    /// [`BranchflowError::MeaninglessMapping`] or
    /// [`BranchflowError::ContractMismatch`]; the tree phase is left unchanged.
    pub fn freeze_with(&mut self, registry: &dyn DependencyRegistry) -> Result<(), BranchflowError> {
        self.try_walk_mut(&mut |stage| stage.executor.inject_dependencies(registry))?;

        let inputs = self.main_inputs.clone();
        let resolved = self.resolve_mapped_contracts(&inputs)?;

        self.update_phase(Phase::Processing);
        debug!(
            handler = %self.name(),
            stages = self.stage_count(),
            outputs = %format_contracts(&resolved),
            "Stage tree frozen"
        );
        Ok(())
    }

    /// Returns the whole tree to [`Phase::Building`] so it can be edited.
    pub fn thaw(&mut self) {
        self.update_phase(Phase::Building);
    }

    /// Runs the tree on `values`.
    ///
    /// The handler runs first; its result is fed through each step in order.
    /// Returns the final ordered value tuple.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::PhaseViolation`] outside
    /// [`Phase::Processing`], [`BranchflowError::ContractMismatch`] if
    /// `values` do not match the main inputs, or the first handler failure.
    pub fn run(&self, values: &[ArgumentValue]) -> Result<Vec<ArgumentValue>, BranchflowError> {
        self.whitelist_phases(&[Phase::Processing])?;
        contracts::validate_values(&self.main_inputs, values, self.phase)?;

        let mut result = self.executor.invoke(values)?;
        for step in &self.steps {
            result = step.execute(&result)?;
        }
        Ok(result)
    }

    /// Visits this stage and every descendant, depth first: the stage itself,
    /// then each step in order, each sibling in order.
    pub fn walk(&self, visit: &mut dyn FnMut(&Self)) {
        visit(self);
        for step in &self.steps {
            for stage in step.stages() {
                stage.walk(visit);
            }
        }
    }

    /// Describes the tree.
    #[must_use]
    pub fn summary(&self) -> StageSummary {
        StageSummary {
            handler: self.name().to_string(),
            system: self.executor.system_kind(),
            phase: self.phase,
            inputs: self.main_inputs.clone(),
            outputs: self.current_outputs.clone(),
            resolved_outputs: self.resolved_outputs.clone(),
            steps: self
                .steps
                .iter()
                .map(|step| step.stages().iter().map(Self::summary).collect())
                .collect(),
        }
    }

    fn whitelist_phases(&self, allowed: &[Phase]) -> Result<(), BranchflowError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(BranchflowError::phase_violation(self.phase, allowed))
        }
    }

    fn update_phase(&mut self, phase: Phase) {
        self.walk_mut(&mut |stage| stage.phase = phase);
    }

    fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut Self)) {
        visit(self);
        for step in &mut self.steps {
            for stage in step.stages_mut() {
                stage.walk_mut(visit);
            }
        }
    }

    fn try_walk_mut(
        &mut self,
        visit: &mut dyn FnMut(&mut Self) -> Result<(), BranchflowError>,
    ) -> Result<(), BranchflowError> {
        visit(self)?;
        for step in &mut self.steps {
            for stage in step.stages_mut() {
                stage.try_walk_mut(visit)?;
            }
        }
        Ok(())
    }

    /// Current output contracts of every stage, in walk order.
    fn output_snapshot(&self) -> Vec<Vec<ArgumentContract>> {
        let mut snapshot = Vec::new();
        self.walk(&mut |stage| snapshot.push(stage.current_outputs.clone()));
        snapshot
    }

    /// Restores a snapshot taken on the same topology.
    fn restore_outputs(&mut self, snapshot: Vec<Vec<ArgumentContract>>) {
        let mut saved = snapshot.into_iter();
        self.walk_mut(&mut |stage| {
            if let Some(outputs) = saved.next() {
                stage.current_outputs = outputs;
            }
        });
    }

    fn stage_at_mut(&mut self, path: &StagePath) -> Result<&mut Self, BranchflowError> {
        let mut stage = self;
        for segment in path.segments() {
            stage = stage
                .steps
                .get_mut(segment.step)
                .and_then(|step| step.stages_mut().get_mut(segment.sibling))
                .ok_or_else(|| BranchflowError::InvalidPath {
                    path: path.to_string(),
                })?;
        }
        Ok(stage)
    }

    /// Recomputes current output contracts bottom-up and re-validates every
    /// step against the contracts accumulated before it.
    fn refresh_contracts(&mut self) -> Result<(), BranchflowError> {
        for step in &mut self.steps {
            for stage in step.stages_mut() {
                stage.refresh_contracts()?;
            }
        }

        let mut current = self.main_outputs.clone();
        for step in &self.steps {
            step.validate_input(&current, self.phase)?;
            current = step.combined_output();
        }
        self.current_outputs = current;
        Ok(())
    }
}

/// Serializable description of a stage tree.
#[derive(Debug, Clone, Serialize)]
pub struct StageSummary {
    /// Handler name.
    pub handler: String,
    /// Structural handler kind, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<SystemHandler>,
    /// Current phase.
    pub phase: Phase,
    /// Main input contracts.
    pub inputs: Vec<ArgumentContract>,
    /// Current output contracts.
    pub outputs: Vec<ArgumentContract>,
    /// Resolved output contracts, once resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_outputs: Option<Vec<ArgumentContract>>,
    /// Attached steps, each a list of sibling summaries.
    pub steps: Vec<Vec<StageSummary>>,
}
