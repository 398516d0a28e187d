//! Argument contracts: per-position type descriptors of a value tuple.

use serde::{Serialize, Serializer};
use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Name rendered for an erased contract.
pub const ERASED_NAME: &str = "?";

/// A type descriptor for one position in a value tuple.
///
/// A contract is either a concrete type identity or the *erased* placeholder,
/// meaning the type is not known yet and will be resolved against the real
/// upstream contracts before the tree runs. Contracts compare by type
/// identity only.
#[derive(Clone, Copy)]
pub struct ArgumentContract {
    repr: Repr,
}

#[derive(Clone, Copy)]
enum Repr {
    Concrete { id: TypeId, name: &'static str },
    Erased,
}

impl ArgumentContract {
    /// Creates the contract for type `T`.
    #[must_use]
    pub fn of<T: Any>() -> Self {
        Self {
            repr: Repr::Concrete {
                id: TypeId::of::<T>(),
                name: std::any::type_name::<T>(),
            },
        }
    }

    /// Creates the erased placeholder contract.
    #[must_use]
    pub const fn erased() -> Self {
        Self { repr: Repr::Erased }
    }

    /// Returns true if this is the erased placeholder.
    #[must_use]
    pub const fn is_erased(&self) -> bool {
        matches!(self.repr, Repr::Erased)
    }

    /// Returns the type identity, or `None` when erased.
    #[must_use]
    pub const fn type_id(&self) -> Option<TypeId> {
        match self.repr {
            Repr::Concrete { id, .. } => Some(id),
            Repr::Erased => None,
        }
    }

    /// Returns the type name, or `"?"` when erased.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self.repr {
            Repr::Concrete { name, .. } => name,
            Repr::Erased => ERASED_NAME,
        }
    }

    /// Returns true if this contract is of type `T`.
    #[must_use]
    pub fn is<T: Any>(&self) -> bool {
        self.type_id() == Some(TypeId::of::<T>())
    }

    /// Returns true if a value described by `producer` may flow into a
    /// position described by `self`.
    ///
    /// The erased placeholder on either side is provisionally compatible.
    #[must_use]
    pub fn accepts(&self, producer: &Self) -> bool {
        match (self.repr, producer.repr) {
            (Repr::Erased, _) | (_, Repr::Erased) => true,
            (Repr::Concrete { id: want, .. }, Repr::Concrete { id: have, .. }) => want == have,
        }
    }
}

impl PartialEq for ArgumentContract {
    fn eq(&self, other: &Self) -> bool {
        self.type_id() == other.type_id()
    }
}

impl Eq for ArgumentContract {}

impl Hash for ArgumentContract {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id().hash(state);
    }
}

impl fmt::Debug for ArgumentContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl fmt::Display for ArgumentContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl Serialize for ArgumentContract {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_name())
    }
}

/// Renders a contract list as `[a, b, c]`.
#[must_use]
pub fn format_contracts(contracts: &[ArgumentContract]) -> String {
    let names: Vec<&str> = contracts.iter().map(ArgumentContract::type_name).collect();
    format!("[{}]", names.join(", "))
}
