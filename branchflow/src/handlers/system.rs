//! Built-in structural handlers.
//!
//! Duplicate, swap and bridge reshape the value tuple without looking at the
//! values. Their declared contracts are erased, so their real output contracts
//! are resolved against the upstream contracts before the tree runs.

use crate::core::{format_contracts, ArgumentContract, ArgumentValue};
use crate::errors::{BranchflowError, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of structural handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemHandler {
    /// `(a) -> (a, a)`
    Duplicate,
    /// `(a, b) -> (b, a)`
    Swap,
    /// `(a) -> (a)`, resolving an erased contract to the upstream one.
    Bridge,
}

impl SystemHandler {
    /// Returns the handler name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Duplicate => "Duplicate",
            Self::Swap => "Swap",
            Self::Bridge => "Bridge",
        }
    }

    const fn arity(self) -> usize {
        match self {
            Self::Duplicate | Self::Bridge => 1,
            Self::Swap => 2,
        }
    }

    /// Declared (erased) input contracts.
    #[must_use]
    pub fn declared_inputs(self) -> Vec<ArgumentContract> {
        vec![ArgumentContract::erased(); self.arity()]
    }

    /// Declared (erased) output contracts.
    #[must_use]
    pub fn declared_outputs(self) -> Vec<ArgumentContract> {
        match self {
            Self::Duplicate | Self::Swap => vec![ArgumentContract::erased(); 2],
            Self::Bridge => vec![ArgumentContract::erased()],
        }
    }

    /// Resolves the real output contracts from the upstream contracts.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::MeaninglessMapping`] if the upstream arity is
    /// wrong or any upstream contract is still erased.
    pub fn resolve_outputs(
        self,
        upstream: &[ArgumentContract],
    ) -> Result<Vec<ArgumentContract>, BranchflowError> {
        if upstream.len() != self.arity() {
            return Err(self.meaningless(format!(
                "expects {} upstream contract(s), got {}",
                self.arity(),
                format_contracts(upstream)
            )));
        }
        if upstream.iter().any(ArgumentContract::is_erased) {
            return Err(self.meaningless(format!(
                "mapping an erased contract has no meaning (upstream {})",
                format_contracts(upstream)
            )));
        }

        Ok(match self {
            Self::Duplicate => vec![upstream[0], upstream[0]],
            Self::Swap => vec![upstream[1], upstream[0]],
            Self::Bridge => vec![upstream[0]],
        })
    }

    /// Reshapes a value tuple.
    ///
    /// # Errors
    ///
    /// Returns [`BranchflowError::InvocationFailure`] on an arity mismatch.
    pub fn invoke(self, values: &[ArgumentValue]) -> Result<Vec<ArgumentValue>, BranchflowError> {
        match (self, values) {
            (Self::Duplicate, [value]) => Ok(vec![value.clone(), value.clone()]),
            (Self::Swap, [first, second]) => Ok(vec![second.clone(), first.clone()]),
            (Self::Bridge, [value]) => Ok(vec![value.clone()]),
            _ => Err(BranchflowError::invocation(
                self.name(),
                Operation::Main,
                format!("expects {} value(s), got {}", self.arity(), values.len()),
            )),
        }
    }

    fn meaningless(self, reason: String) -> BranchflowError {
        BranchflowError::MeaninglessMapping {
            handler: self.name().to_string(),
            reason,
        }
    }
}

impl fmt::Display for SystemHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn int() -> ArgumentContract {
        ArgumentContract::of::<i32>()
    }

    fn text() -> ArgumentContract {
        ArgumentContract::of::<String>()
    }

    #[test]
    fn test_duplicate_resolves_twice() {
        assert_eq!(SystemHandler::Duplicate.resolve_outputs(&[int()]).unwrap(), vec![int(), int()]);
    }

    #[test]
    fn test_duplicate_rejects_erased() {
        let err = SystemHandler::Duplicate
            .resolve_outputs(&[ArgumentContract::erased()])
            .unwrap_err();
        assert!(matches!(err, BranchflowError::MeaninglessMapping { .. }));
    }

    #[test]
    fn test_swap_reverses() {
        assert_eq!(SystemHandler::Swap.resolve_outputs(&[int(), text()]).unwrap(), vec![text(), int()]);
        assert!(SystemHandler::Swap
            .resolve_outputs(&[int(), ArgumentContract::erased()])
            .is_err());
    }

    #[test]
    fn test_bridge_passes_through() {
        assert_eq!(SystemHandler::Bridge.resolve_outputs(&[text()]).unwrap(), vec![text()]);
        assert!(SystemHandler::Bridge.resolve_outputs(&[text(), int()]).is_err());
    }

    #[test]
    fn test_declared_contracts_are_erased() {
        for handler in [SystemHandler::Duplicate, SystemHandler::Swap, SystemHandler::Bridge] {
            assert!(handler.declared_inputs().iter().all(ArgumentContract::is_erased));
            assert!(handler.declared_outputs().iter().all(ArgumentContract::is_erased));
        }
    }

    #[test]
    fn test_invoke_reshapes_values() {
        let values = vec![ArgumentValue::new(1_i32), ArgumentValue::new("b".to_string())];
        let swapped = SystemHandler::Swap.invoke(&values).unwrap();
        assert_eq!(swapped[0].get::<String>().unwrap(), "b");
        assert_eq!(*swapped[1].get::<i32>().unwrap(), 1);

        let doubled = SystemHandler::Duplicate.invoke(&values[..1]).unwrap();
        assert_eq!(doubled.len(), 2);

        assert!(SystemHandler::Bridge.invoke(&values).is_err());
    }
}
