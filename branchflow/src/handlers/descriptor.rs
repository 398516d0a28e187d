//! Static capability descriptors for handler types.
//!
//! A descriptor lists, once per handler type, the main operation and its
//! signature, the ordered pre/post hooks and the injectable fields. It is
//! built with plain function pointers, so no runtime reflection is involved.

use super::Handler;
use crate::context::{Dependency, DependencyKey};
use crate::core::{ArgumentContract, ArgumentValue, HandlerOutput};
use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, LazyLock};

/// The main operation of a handler.
pub type MainOperation<H> = fn(&H, &[ArgumentValue]) -> anyhow::Result<HandlerOutput>;

/// A pre- or post-hook. Receives the whole input (or output) tuple.
pub type Hook<H> = fn(&H, &[ArgumentValue]) -> anyhow::Result<()>;

type Binder<H> = Box<dyn Fn(&mut H, Dependency) -> bool + Send + Sync>;

/// Declared return shape of a main operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputShape {
    /// Returns nothing.
    Unit,
    /// Returns one value.
    Single(ArgumentContract),
    /// Returns an explicit multi-value tuple.
    Multi(Vec<ArgumentContract>),
}

impl OutputShape {
    /// A single output of type `T`.
    #[must_use]
    pub fn single<T: Any>() -> Self {
        Self::Single(ArgumentContract::of::<T>())
    }

    /// The output contract list: empty for `Unit`, one per component for
    /// `Multi`, one element otherwise.
    #[must_use]
    pub fn contracts(&self) -> Vec<ArgumentContract> {
        match self {
            Self::Unit => Vec::new(),
            Self::Single(contract) => vec![*contract],
            Self::Multi(contracts) => contracts.clone(),
        }
    }
}

/// An injectable field of a handler.
pub struct InjectionPoint<H> {
    field: &'static str,
    key: DependencyKey,
    required: bool,
    bind: Binder<H>,
}

impl<H: 'static> InjectionPoint<H> {
    /// A field resolved by exact type lookup.
    #[must_use]
    pub fn by_type<T: Any + Send + Sync>(field: &'static str, setter: fn(&mut H, Arc<T>)) -> Self {
        Self {
            field,
            key: DependencyKey::of_type::<T>(),
            required: true,
            bind: Box::new(move |handler: &mut H, dependency: Dependency| {
                match dependency.downcast::<T>() {
                    Ok(instance) => {
                        setter(handler, instance);
                        true
                    }
                    Err(_) => false,
                }
            }),
        }
    }

    /// A field resolved by capability lookup; `C` is usually a `dyn Trait`.
    #[must_use]
    pub fn by_capability<C: ?Sized + Send + Sync + 'static>(
        field: &'static str,
        setter: fn(&mut H, Arc<C>),
    ) -> Self {
        Self {
            field,
            key: DependencyKey::of_capability::<C>(),
            required: true,
            bind: Box::new(move |handler: &mut H, dependency: Dependency| {
                match dependency.downcast::<Arc<C>>() {
                    Ok(instance) => {
                        setter(handler, Arc::clone(instance.as_ref()));
                        true
                    }
                    Err(_) => false,
                }
            }),
        }
    }

    /// Marks the field optional: a missing dependency is logged, not fatal.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

impl<H> InjectionPoint<H> {
    /// Returns the field name.
    #[must_use]
    pub fn field(&self) -> &'static str {
        self.field
    }

    /// Returns what the field is looked up by.
    #[must_use]
    pub fn key(&self) -> DependencyKey {
        self.key
    }

    /// Returns true if a missing dependency is fatal.
    #[must_use]
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Binds a resolved dependency onto the handler.
    ///
    /// Returns false if the dependency has the wrong type.
    pub fn bind(&self, handler: &mut H, dependency: Dependency) -> bool {
        (self.bind)(handler, dependency)
    }
}

impl<H> fmt::Debug for InjectionPoint<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectionPoint")
            .field("field", &self.field)
            .field("key", &self.key)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}

/// Capability descriptor of a handler type.
pub struct HandlerDescriptor<H> {
    name: &'static str,
    inputs: Vec<ArgumentContract>,
    output: OutputShape,
    main: Option<MainOperation<H>>,
    before: Vec<Hook<H>>,
    after: Vec<Hook<H>>,
    injections: Vec<InjectionPoint<H>>,
}

impl<H> HandlerDescriptor<H> {
    /// Starts a descriptor with no inputs, unit output and no operations.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inputs: Vec::new(),
            output: OutputShape::Unit,
            main: None,
            before: Vec::new(),
            after: Vec::new(),
            injections: Vec::new(),
        }
    }

    /// Appends an input parameter of type `T`.
    #[must_use]
    pub fn input<T: Any>(mut self) -> Self {
        self.inputs.push(ArgumentContract::of::<T>());
        self
    }

    /// Appends an input parameter with an explicit contract.
    #[must_use]
    pub fn input_contract(mut self, contract: ArgumentContract) -> Self {
        self.inputs.push(contract);
        self
    }

    /// Declares the return shape.
    #[must_use]
    pub fn output(mut self, shape: OutputShape) -> Self {
        self.output = shape;
        self
    }

    /// Registers the main operation.
    #[must_use]
    pub fn main(mut self, operation: MainOperation<H>) -> Self {
        self.main = Some(operation);
        self
    }

    /// Registers a pre-hook. Hooks run in registration order.
    #[must_use]
    pub fn before(mut self, hook: Hook<H>) -> Self {
        self.before.push(hook);
        self
    }

    /// Registers a post-hook. Hooks run in registration order.
    #[must_use]
    pub fn after(mut self, hook: Hook<H>) -> Self {
        self.after.push(hook);
        self
    }

    /// Registers an injectable field.
    #[must_use]
    pub fn inject(mut self, point: InjectionPoint<H>) -> Self {
        self.injections.push(point);
        self
    }

    /// Returns the handler name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the declared input contracts.
    #[must_use]
    pub fn inputs(&self) -> &[ArgumentContract] {
        &self.inputs
    }

    /// Returns the declared output shape.
    #[must_use]
    pub fn output_shape(&self) -> &OutputShape {
        &self.output
    }

    /// Returns the main operation, if one was registered.
    #[must_use]
    pub fn main_operation(&self) -> Option<MainOperation<H>> {
        self.main
    }

    /// Returns the pre-hooks in order.
    #[must_use]
    pub fn before_hooks(&self) -> &[Hook<H>] {
        &self.before
    }

    /// Returns the post-hooks in order.
    #[must_use]
    pub fn after_hooks(&self) -> &[Hook<H>] {
        &self.after
    }

    /// Returns the injectable fields.
    #[must_use]
    pub fn injections(&self) -> &[InjectionPoint<H>] {
        &self.injections
    }
}

impl<H> fmt::Debug for HandlerDescriptor<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("output", &self.output)
            .field("has_main", &self.main.is_some())
            .field("before_hooks", &self.before.len())
            .field("after_hooks", &self.after.len())
            .field("injections", &self.injections)
            .finish()
    }
}

static DESCRIPTORS: LazyLock<DashMap<TypeId, Arc<dyn Any + Send + Sync>>> =
    LazyLock::new(DashMap::new);

/// Returns the descriptor of `H`, building it on first use.
///
/// `H::descriptor()` runs at most once per handler type (barring a race
/// between two first uses, where the first stored descriptor wins).
pub fn descriptor_for<H: Handler>() -> Arc<HandlerDescriptor<H>> {
    let key = TypeId::of::<H>();

    let cached = DESCRIPTORS.get(&key).map(|entry| Arc::clone(entry.value()));
    let erased = match cached {
        Some(erased) => erased,
        None => {
            // Built outside the map lock so a descriptor may look up others.
            let built: Arc<dyn Any + Send + Sync> = Arc::new(H::descriptor());
            Arc::clone(DESCRIPTORS.entry(key).or_insert(built).value())
        }
    };

    erased
        .downcast::<HandlerDescriptor<H>>()
        .unwrap_or_else(|_| Arc::new(H::descriptor()))
}
