//! Runtime values flowing between stages.

use super::ArgumentContract;
use crate::errors::BranchflowError;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A contract bound to one concrete runtime value.
///
/// Values are reference counted, so cloning is cheap and a structural handler
/// can emit the same value more than once.
#[derive(Clone)]
pub struct ArgumentValue {
    contract: ArgumentContract,
    value: Arc<dyn Any + Send + Sync>,
}

impl ArgumentValue {
    /// Wraps a value, deriving its contract from its type.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            contract: ArgumentContract::of::<T>(),
            value: Arc::new(value),
        }
    }

    /// Wraps an already shared value.
    #[must_use]
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            contract: ArgumentContract::of::<T>(),
            value,
        }
    }

    /// Returns the contract of this value.
    #[must_use]
    pub const fn contract(&self) -> ArgumentContract {
        self.contract
    }

    /// Returns a reference to the value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns a reference to the value as a `T`.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::ValueType`] if the value holds another type.
    pub fn get<T: Any>(&self) -> Result<&T, BranchflowError> {
        self.downcast_ref::<T>().ok_or(BranchflowError::ValueType {
            expected: std::any::type_name::<T>(),
            actual: self.contract,
        })
    }

    /// Returns the value as a shared `Arc<T>`.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::ValueType`] if the value holds another type.
    pub fn get_arc<T: Any + Send + Sync>(&self) -> Result<Arc<T>, BranchflowError> {
        Arc::clone(&self.value)
            .downcast::<T>()
            .map_err(|_| BranchflowError::ValueType {
                expected: std::any::type_name::<T>(),
                actual: self.contract,
            })
    }
}

impl fmt::Debug for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentValue")
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

/// Contracts of a value tuple, in order.
#[must_use]
pub fn contracts_of(values: &[ArgumentValue]) -> Vec<ArgumentContract> {
    values.iter().map(ArgumentValue::contract).collect()
}

/// Ordered carrier for a main operation that returns more than one value.
#[derive(Debug, Clone, Default)]
pub struct MultiValue {
    values: Vec<ArgumentValue>,
}

impl MultiValue {
    /// Creates an empty carrier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.values.push(ArgumentValue::new(value));
        self
    }

    /// Appends an already wrapped value.
    #[must_use]
    pub fn with_value(mut self, value: ArgumentValue) -> Self {
        self.values.push(value);
        self
    }

    /// Returns the number of carried values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing is carried.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the carried values.
    #[must_use]
    pub fn values(&self) -> &[ArgumentValue] {
        &self.values
    }

    /// Unpacks the carried values.
    #[must_use]
    pub fn into_values(self) -> Vec<ArgumentValue> {
        self.values
    }
}

impl From<Vec<ArgumentValue>> for MultiValue {
    fn from(values: Vec<ArgumentValue>) -> Self {
        Self { values }
    }
}

impl FromIterator<ArgumentValue> for MultiValue {
    fn from_iter<I: IntoIterator<Item = ArgumentValue>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// What a handler's main operation returned.
#[derive(Debug, Clone)]
pub enum HandlerOutput {
    /// Nothing.
    Unit,
    /// One value.
    Single(ArgumentValue),
    /// An explicit multi-value tuple.
    Multi(MultiValue),
}

impl HandlerOutput {
    /// Wraps a single value.
    #[must_use]
    pub fn single<T: Any + Send + Sync>(value: T) -> Self {
        Self::Single(ArgumentValue::new(value))
    }

    /// Returns true if nothing was returned.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }

    /// Flattens into an ordered value tuple.
    #[must_use]
    pub fn into_values(self) -> Vec<ArgumentValue> {
        match self {
            Self::Unit => Vec::new(),
            Self::Single(value) => vec![value],
            Self::Multi(multi) => multi.into_values(),
        }
    }
}

impl From<MultiValue> for HandlerOutput {
    fn from(multi: MultiValue) -> Self {
        Self::Multi(multi)
    }
}
