//! Error types for the branchflow framework.
//!
//! Every failure propagates synchronously to the caller of the operation that
//! detected it (`attach`, `freeze`, `run` or executor construction). Nothing
//! here is retried or swallowed.

use crate::core::{format_contracts, ArgumentContract, Phase};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The main error type for branchflow operations.
#[derive(Debug, Error)]
pub enum BranchflowError {
    /// An operation was attempted outside its allowed phases.
    #[error("Phase {phase} is not in the allowed set [{}]", join_phases(.allowed))]
    PhaseViolation {
        /// The phase the stage was in.
        phase: Phase,
        /// The phases the operation accepts.
        allowed: Vec<Phase>,
    },

    /// Producer and consumer contract lists disagree.
    #[error(transparent)]
    ContractMismatch(#[from] ContractMismatchError),

    /// A structural handler was wired against an unresolved upstream contract.
    #[error("Meaningless mapping for handler '{handler}': {reason}")]
    MeaninglessMapping {
        /// The structural handler name.
        handler: String,
        /// Why the mapping cannot be resolved.
        reason: String,
    },

    /// A handler declares no main operation.
    #[error("Handler '{handler}' declares no main operation")]
    MissingMainOperation {
        /// The handler name.
        handler: String,
    },

    /// A hook or the main operation failed during execution.
    #[error("Handler '{handler}' failed in {operation}: {source}")]
    InvocationFailure {
        /// The handler name.
        handler: String,
        /// Which operation failed.
        operation: Operation,
        /// The original cause.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A required dependency could not be injected.
    #[error("Cannot inject field '{field}' of handler '{handler}' from {dependency}: {reason}")]
    InjectionFailure {
        /// The handler name.
        handler: String,
        /// The injectable field.
        field: &'static str,
        /// The dependency that was looked up.
        dependency: String,
        /// Why injection failed.
        reason: String,
    },

    /// A step was created without sibling stages.
    #[error("A stage step needs at least one sibling stage (phase {phase})")]
    EmptyStep {
        /// The phase of the stage the step was offered to.
        phase: Phase,
    },

    /// A value was read as the wrong type.
    #[error("Expected a value of type {expected}, found {actual}")]
    ValueType {
        /// The requested type.
        expected: &'static str,
        /// The contract of the stored value.
        actual: ArgumentContract,
    },

    /// A stage path does not address a stage in the tree.
    #[error("No stage at path {path}")]
    InvalidPath {
        /// The rendered path.
        path: String,
    },

    /// The tree is held by in-flight runs and cannot be edited.
    #[error("Topology is shared with in-flight runs and cannot be modified")]
    TopologyShared,

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Pipeline configuration is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl BranchflowError {
    /// Wraps a handler failure.
    pub fn invocation(
        handler: impl Into<String>,
        operation: Operation,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Self::InvocationFailure {
            handler: handler.into(),
            operation,
            source: source.into(),
        }
    }

    /// Creates a phase violation.
    #[must_use]
    pub fn phase_violation(phase: Phase, allowed: &[Phase]) -> Self {
        Self::PhaseViolation {
            phase,
            allowed: allowed.to_vec(),
        }
    }

    /// Returns the phase recorded on the error, if any.
    #[must_use]
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::PhaseViolation { phase, .. } | Self::EmptyStep { phase } => Some(*phase),
            Self::ContractMismatch(err) => Some(err.phase),
            _ => None,
        }
    }

    /// Returns the diagnostic code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PhaseViolation { .. } => "BRANCH-001-PHASE",
            Self::ContractMismatch(_) => "BRANCH-002-CONTRACT",
            Self::MeaninglessMapping { .. } => "BRANCH-003-MAPPING",
            Self::MissingMainOperation { .. } => "BRANCH-004-MAIN_OP",
            Self::InvocationFailure { .. } => "BRANCH-005-INVOKE",
            Self::InjectionFailure { .. } => "BRANCH-006-INJECT",
            Self::EmptyStep { .. } => "BRANCH-007-EMPTY_STEP",
            Self::ValueType { .. } => "BRANCH-008-VALUE_TYPE",
            Self::InvalidPath { .. } => "BRANCH-009-PATH",
            Self::TopologyShared => "BRANCH-010-SHARED",
            Self::Internal(_) => "BRANCH-011-INTERNAL",
            Self::InvalidConfig(_) => "BRANCH-012-CONFIG",
        }
    }

    /// Builds structured diagnostics for this error.
    #[must_use]
    pub fn error_info(&self) -> ContractErrorInfo {
        let code = self.code();
        let mut info = ContractErrorInfo::new(code, self.to_string());
        if let Some(hint) = ContractSuggestions::get(code) {
            info = info.with_fix_hint(hint);
        }
        if let Some(phase) = self.phase() {
            info = info.with_context_entry("phase", phase.to_string());
        }

        match self {
            Self::ContractMismatch(err) => {
                info = info
                    .with_context_entry("producer", format_contracts(&err.producer))
                    .with_context_entry("consumer", format_contracts(&err.consumer));
                if let Some(position) = err.position {
                    info = info.with_context_entry("position", position.to_string());
                }
            }
            Self::MeaninglessMapping { handler, .. }
            | Self::MissingMainOperation { handler }
            | Self::InvocationFailure { handler, .. } => {
                info = info.with_context_entry("handler", handler.clone());
            }
            Self::InjectionFailure {
                handler,
                field,
                dependency,
                ..
            } => {
                info = info
                    .with_context_entry("handler", handler.clone())
                    .with_context_entry("field", *field)
                    .with_context_entry("dependency", dependency.clone());
            }
            _ => {}
        }

        info
    }
}

fn join_phases(phases: &[Phase]) -> String {
    phases
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// The handler operation an invocation failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// A pre-hook, by registration index.
    BeforeHook(usize),
    /// The main operation.
    Main,
    /// A post-hook, by registration index.
    AfterHook(usize),
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeHook(index) => write!(f, "before-hook #{index}"),
            Self::Main => write!(f, "main operation"),
            Self::AfterHook(index) => write!(f, "after-hook #{index}"),
        }
    }
}

/// Error raised when two contract lists are structurally incompatible.
#[derive(Debug, Clone, Error)]
#[error("{message} (detected in phase {phase})")]
pub struct ContractMismatchError {
    /// The phase the mismatch was detected in.
    pub phase: Phase,
    /// The producing side.
    pub producer: Vec<ArgumentContract>,
    /// The consuming side.
    pub consumer: Vec<ArgumentContract>,
    /// The first incompatible position, or `None` for an arity mismatch.
    pub position: Option<usize>,
    /// The error message.
    pub message: String,
}

impl ContractMismatchError {
    /// Creates an arity mismatch.
    #[must_use]
    pub fn arity(phase: Phase, producer: &[ArgumentContract], consumer: &[ArgumentContract]) -> Self {
        Self {
            phase,
            producer: producer.to_vec(),
            consumer: consumer.to_vec(),
            position: None,
            message: format!(
                "Arity mismatch: producer {} yields {} value(s), consumer {} expects {}",
                format_contracts(producer),
                producer.len(),
                format_contracts(consumer),
                consumer.len()
            ),
        }
    }

    /// Creates a per-position type mismatch.
    #[must_use]
    pub fn at_position(
        phase: Phase,
        producer: &[ArgumentContract],
        consumer: &[ArgumentContract],
        position: usize,
    ) -> Self {
        let have = producer.get(position).map_or("<missing>", ArgumentContract::type_name);
        let want = consumer.get(position).map_or("<missing>", ArgumentContract::type_name);
        Self {
            phase,
            producer: producer.to_vec(),
            consumer: consumer.to_vec(),
            position: Some(position),
            message: format!(
                "Type mismatch at position {position}: consumer expects {want}, producer yields {have}"
            ),
        }
    }
}

/// Metadata about an error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "BRANCH-002-CONTRACT").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        serde_json::Value::Object(map)
    }
}

/// Provides default suggestions for error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "BRANCH-001-PHASE" => Some(
                "Attach steps while the tree is BUILDING and call freeze() before run(). \
                 Use thaw() to edit a frozen tree.",
            ),
            "BRANCH-002-CONTRACT" => Some(
                "Every sibling in a step receives the whole upstream tuple. \
                 Make each sibling's inputs match the upstream outputs in count and type.",
            ),
            "BRANCH-003-MAPPING" => Some(
                "Structural handlers need concrete upstream types. \
                 Place a typed stage before duplicate/swap/bridge.",
            ),
            "BRANCH-004-MAIN_OP" => Some(
                "Register the main operation with HandlerDescriptor::main in the handler's descriptor().",
            ),
            "BRANCH-006-INJECT" => Some(
                "Provide the dependency in the registry passed to freeze_with(), \
                 or mark the injection point optional.",
            ),
            "BRANCH-007-EMPTY_STEP" => Some("Pass at least one sibling stage to attach()."),
            "BRANCH-010-SHARED" => Some(
                "Wait for concurrent runs to finish before editing or re-freezing the pipeline.",
            ),
            "BRANCH-012-CONFIG" => Some("max_concurrent_runs must be at least 1."),
            _ => None,
        }
    }
}
