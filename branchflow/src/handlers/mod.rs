//! Handler authoring surface and dispatch.
//!
//! A handler is a user-authored unit of work. It describes itself once per
//! type through a [`HandlerDescriptor`]: one main operation, ordered pre- and
//! post-hooks, and injectable fields. The [`HandlerExecutor`] wraps either a
//! user handler or one of the built-in [`SystemHandler`]s behind one
//! invocation contract.
//!
//! ```rust,ignore
//! struct Length;
//!
//! impl Length {
//!     fn process(&self, args: &[ArgumentValue]) -> anyhow::Result<HandlerOutput> {
//!         Ok(HandlerOutput::single(args[0].get::<String>()?.len()))
//!     }
//! }
//!
//! impl Handler for Length {
//!     fn descriptor() -> HandlerDescriptor<Self> {
//!         HandlerDescriptor::new("Length")
//!             .input::<String>()
//!             .output(OutputShape::single::<usize>())
//!             .main(Self::process)
//!     }
//! }
//! ```

mod descriptor;
mod executor;
mod system;

pub use descriptor::{
    descriptor_for, HandlerDescriptor, Hook, InjectionPoint, MainOperation, OutputShape,
};
pub use executor::HandlerExecutor;
pub use system::SystemHandler;

/// Trait for user-authored handlers.
///
/// Handlers are invoked through `&self`, possibly from several threads at once
/// when a frozen tree is replayed concurrently; any mutable state must use
/// interior mutability.
pub trait Handler: Send + Sync + Sized + 'static {
    /// Describes the handler type. Called at most once per type.
    fn descriptor() -> HandlerDescriptor<Self>;
}
