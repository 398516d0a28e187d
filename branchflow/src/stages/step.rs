//! Branch points: sibling stages fed by one upstream tuple.

use super::Stage;
use crate::contracts;
use crate::core::{ArgumentContract, ArgumentValue, Phase};
use crate::errors::{BranchflowError, ContractMismatchError};

/// A branch point holding one or more sibling stages.
///
/// Every sibling receives the whole upstream tuple (fan-out); their results
/// are concatenated in declaration order (fan-in). Siblings do not see each
/// other's results. A step owns its siblings exclusively.
#[derive(Debug)]
pub struct StageStep {
    stages: Vec<Stage>,
}

impl StageStep {
    /// Creates a step from its sibling stages.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::EmptyStep`] if no stage is given.
    pub fn new(stages: impl IntoIterator<Item = Stage>) -> Result<Self, BranchflowError> {
        let stages: Vec<Stage> = stages.into_iter().collect();
        if stages.is_empty() {
            return Err(BranchflowError::EmptyStep {
                phase: Phase::Building,
            });
        }
        Ok(Self { stages })
    }

    /// Creates a step with a single stage.
    #[must_use]
    pub fn single(stage: Stage) -> Self {
        Self {
            stages: vec![stage],
        }
    }

    /// Returns the sibling stages in declaration order.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub(crate) fn stages_mut(&mut self) -> &mut [Stage] {
        &mut self.stages
    }

    /// Returns the number of siblings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns true if the step has no siblings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Input requirement of each sibling. Each must accept the whole
    /// upstream tuple; the tuple is never partitioned across siblings.
    #[must_use]
    pub fn input_requirements(&self) -> Vec<&[ArgumentContract]> {
        self.stages
            .iter()
            .map(Stage::main_input_contracts)
            .collect()
    }

    /// Checks the upstream contracts against every sibling's inputs.
    ///
    /// # Errors
    ///
    /// Returns the first sibling's [`ContractMismatchError`].
    pub fn validate_input(
        &self,
        upstream: &[ArgumentContract],
        phase: Phase,
    ) -> Result<(), ContractMismatchError> {
        self.stages
            .iter()
            .try_for_each(|stage| contracts::validate(upstream, stage.main_input_contracts(), phase))
    }

    /// Concatenation of every sibling's current output contracts.
    #[must_use]
    pub fn combined_output(&self) -> Vec<ArgumentContract> {
        self.stages
            .iter()
            .flat_map(|stage| stage.current_output_contracts().iter().copied())
            .collect()
    }

    /// Re-resolves erased contracts in every sibling against `upstream` and
    /// returns the step's resolved combined output.
    ///
    /// # Errors
    ///
    /// Propagates the first sibling failure.
    pub fn remap(
        &mut self,
        upstream: &[ArgumentContract],
    ) -> Result<Vec<ArgumentContract>, BranchflowError> {
        let mut combined = Vec::new();
        for stage in &mut self.stages {
            combined.extend(stage.resolve_mapped_contracts(upstream)?);
        }
        Ok(combined)
    }

    /// Runs every sibling on the same input tuple, in order, and concatenates
    /// their results. The first failure aborts the remaining siblings.
    ///
    /// # Errors
    ///
    /// Propagates the first sibling failure.
    pub fn execute(&self, values: &[ArgumentValue]) -> Result<Vec<ArgumentValue>, BranchflowError> {
        let mut combined = Vec::new();
        for stage in &self.stages {
            combined.extend(stage.run(values)?);
        }
        Ok(combined)
    }
}
