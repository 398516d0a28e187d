//! Uniform invocation and introspection over handlers.

use super::descriptor::{descriptor_for, HandlerDescriptor};
use super::{Handler, SystemHandler};
use crate::context::DependencyRegistry;
use crate::contracts;
use crate::core::{ArgumentContract, ArgumentValue, HandlerOutput, Phase};
use crate::errors::{BranchflowError, Operation};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Object-safe view of a typed user handler.
pub(crate) trait DynHandler: Send + Sync {
    fn before(&self, values: &[ArgumentValue]) -> Result<(), BranchflowError>;
    fn main(&self, values: &[ArgumentValue]) -> Result<HandlerOutput, BranchflowError>;
    fn after(&self, values: &[ArgumentValue]) -> Result<(), BranchflowError>;
    fn inject(&mut self, registry: &dyn DependencyRegistry) -> Result<(), BranchflowError>;
}

struct TypedHandler<H> {
    handler: H,
    descriptor: Arc<HandlerDescriptor<H>>,
}

impl<H: Handler> DynHandler for TypedHandler<H> {
    fn before(&self, values: &[ArgumentValue]) -> Result<(), BranchflowError> {
        for (index, hook) in self.descriptor.before_hooks().iter().enumerate() {
            hook(&self.handler, values).map_err(|err| {
                BranchflowError::invocation(
                    self.descriptor.name(),
                    Operation::BeforeHook(index),
                    err,
                )
            })?;
        }
        Ok(())
    }

    fn main(&self, values: &[ArgumentValue]) -> Result<HandlerOutput, BranchflowError> {
        let name = self.descriptor.name();
        let operation = self
            .descriptor
            .main_operation()
            .ok_or_else(|| BranchflowError::MissingMainOperation {
                handler: name.to_string(),
            })?;
        operation(&self.handler, values)
            .map_err(|err| BranchflowError::invocation(name, Operation::Main, err))
    }

    fn after(&self, values: &[ArgumentValue]) -> Result<(), BranchflowError> {
        for (index, hook) in self.descriptor.after_hooks().iter().enumerate() {
            hook(&self.handler, values).map_err(|err| {
                BranchflowError::invocation(
                    self.descriptor.name(),
                    Operation::AfterHook(index),
                    err,
                )
            })?;
        }
        Ok(())
    }

    fn inject(&mut self, registry: &dyn DependencyRegistry) -> Result<(), BranchflowError> {
        let name = self.descriptor.name();
        for point in self.descriptor.injections() {
            let key = point.key();
            match key.resolve(registry) {
                Some(dependency) => {
                    if !point.bind(&mut self.handler, dependency) {
                        return Err(BranchflowError::InjectionFailure {
                            handler: name.to_string(),
                            field: point.field(),
                            dependency: key.to_string(),
                            reason: "registry returned an instance of another type".to_string(),
                        });
                    }
                    debug!(handler = name, field = point.field(), dependency = %key, "Injected dependency");
                }
                None if point.is_required() => {
                    return Err(BranchflowError::InjectionFailure {
                        handler: name.to_string(),
                        field: point.field(),
                        dependency: key.to_string(),
                        reason: "no matching dependency registered".to_string(),
                    });
                }
                None => {
                    warn!(
                        handler = name,
                        field = point.field(),
                        dependency = %key,
                        "No dependency found for optional field; leaving it unbound"
                    );
                }
            }
        }
        Ok(())
    }
}

/// Which handler an executor dispatches to, fixed at construction.
pub(crate) enum HandlerKind {
    Duplicate,
    Swap,
    Bridge,
    UserDefined(Box<dyn DynHandler>),
}

impl HandlerKind {
    const fn system(&self) -> Option<SystemHandler> {
        match self {
            Self::Duplicate => Some(SystemHandler::Duplicate),
            Self::Swap => Some(SystemHandler::Swap),
            Self::Bridge => Some(SystemHandler::Bridge),
            Self::UserDefined(_) => None,
        }
    }
}

/// Wraps one handler and presents a uniform invocation contract.
pub struct HandlerExecutor {
    name: String,
    inputs: Vec<ArgumentContract>,
    outputs: Vec<ArgumentContract>,
    kind: HandlerKind,
    injected: bool,
}

impl HandlerExecutor {
    /// Wraps a user handler.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::MissingMainOperation`] if the handler's
    /// descriptor registers no main operation.
    pub fn of<H: Handler>(handler: H) -> Result<Self, BranchflowError> {
        let descriptor = descriptor_for::<H>();
        if descriptor.main_operation().is_none() {
            return Err(BranchflowError::MissingMainOperation {
                handler: descriptor.name().to_string(),
            });
        }

        Ok(Self {
            name: descriptor.name().to_string(),
            inputs: descriptor.inputs().to_vec(),
            outputs: descriptor.output_shape().contracts(),
            kind: HandlerKind::UserDefined(Box::new(TypedHandler {
                handler,
                descriptor,
            })),
            injected: false,
        })
    }

    /// Wraps a structural handler.
    #[must_use]
    pub fn system(handler: SystemHandler) -> Self {
        let kind = match handler {
            SystemHandler::Duplicate => HandlerKind::Duplicate,
            SystemHandler::Swap => HandlerKind::Swap,
            SystemHandler::Bridge => HandlerKind::Bridge,
        };

        Self {
            name: handler.name().to_string(),
            inputs: handler.declared_inputs(),
            outputs: handler.declared_outputs(),
            kind,
            injected: true,
        }
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared input contracts.
    #[must_use]
    pub fn input_contracts(&self) -> &[ArgumentContract] {
        &self.inputs
    }

    /// Returns the declared output contracts.
    #[must_use]
    pub fn output_contracts(&self) -> &[ArgumentContract] {
        &self.outputs
    }

    /// Returns the structural handler kind, or `None` for user handlers.
    #[must_use]
    pub fn system_kind(&self) -> Option<SystemHandler> {
        self.kind.system()
    }

    /// Returns true once dependencies have been injected.
    #[must_use]
    pub fn is_injected(&self) -> bool {
        self.injected
    }

    /// Runs pre-hooks, the main operation and post-hooks.
    ///
    /// An empty result with an empty declared output short-circuits to an
    /// empty tuple without running post-hooks. Any other result must match the
    /// declared output contracts before post-hooks see it.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::InvocationFailure`] wrapping the first
    /// failing hook or main operation.
    pub fn invoke(&self, values: &[ArgumentValue]) -> Result<Vec<ArgumentValue>, BranchflowError> {
        let handler = match &self.kind {
            HandlerKind::UserDefined(handler) => handler,
            HandlerKind::Duplicate => return SystemHandler::Duplicate.invoke(values),
            HandlerKind::Swap => return SystemHandler::Swap.invoke(values),
            HandlerKind::Bridge => return SystemHandler::Bridge.invoke(values),
        };

        handler.before(values)?;
        let output = handler.main(values)?;

        if output.is_unit() {
            if self.outputs.is_empty() {
                return Ok(Vec::new());
            }
            return Err(BranchflowError::invocation(
                &self.name,
                Operation::Main,
                format!(
                    "returned nothing but declares {} output(s)",
                    self.outputs.len()
                ),
            ));
        }

        let result = output.into_values();
        contracts::validate_values(&self.outputs, &result, Phase::Processing)
            .map_err(|err| BranchflowError::invocation(&self.name, Operation::Main, err))?;
        handler.after(&result)?;
        Ok(result)
    }

    /// Resolves the effective output contracts against the upstream ones.
    ///
    /// Structural handlers derive their outputs from `upstream`; every other
    /// handler returns its declared outputs unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::MeaninglessMapping`] if a structural handler
    /// is fed an erased or mis-sized upstream.
    pub fn resolve_system_outputs(
        &self,
        upstream: &[ArgumentContract],
    ) -> Result<Vec<ArgumentContract>, BranchflowError> {
        match self.kind.system() {
            Some(system) => system.resolve_outputs(upstream),
            None => Ok(self.outputs.clone()),
        }
    }

    /// Resolves injectable fields from the registry. Runs at most once.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::InjectionFailure`] if a required dependency
    /// is missing or has the wrong type.
    pub fn inject_dependencies(
        &mut self,
        registry: &dyn DependencyRegistry,
    ) -> Result<(), BranchflowError> {
        if self.injected {
            return Ok(());
        }
        if let HandlerKind::UserDefined(handler) = &mut self.kind {
            handler.inject(registry)?;
        }
        self.injected = true;
        Ok(())
    }
}

impl fmt::Debug for HandlerExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerExecutor")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("system", &self.kind.system())
            .field("injected", &self.injected)
            .finish()
    }
}
