//! Structural compatibility checks between contract lists.

use crate::core::{ArgumentContract, ArgumentValue, Phase};
use crate::errors::ContractMismatchError;

/// Checks that `producer` may flow into `consumer`.
///
/// Arity must match exactly and every position must be accepted by the
/// consumer. The erased contract is provisionally compatible with anything.
/// Only contracts are inspected, never runtime values.
///
/// # Errors
///
/// Returns a [`ContractMismatchError`] tagged with `phase` on the first
/// disagreement.
pub fn validate(
    producer: &[ArgumentContract],
    consumer: &[ArgumentContract],
    phase: Phase,
) -> Result<(), ContractMismatchError> {
    if producer.len() != consumer.len() {
        return Err(ContractMismatchError::arity(phase, producer, consumer));
    }

    match first_incompatible(producer, consumer) {
        Some(position) => Err(ContractMismatchError::at_position(
            phase, producer, consumer, position,
        )),
        None => Ok(()),
    }
}

/// Checks runtime values against the contracts a stage declares as inputs.
///
/// # Errors
///
/// Returns a [`ContractMismatchError`] tagged with `phase` on the first
/// disagreement.
pub fn validate_values(
    consumer: &[ArgumentContract],
    values: &[ArgumentValue],
    phase: Phase,
) -> Result<(), ContractMismatchError> {
    let producer: Vec<ArgumentContract> = values.iter().map(ArgumentValue::contract).collect();
    validate(&producer, consumer, phase)
}

/// Returns true if `producer` may flow into `consumer`.
#[must_use]
pub fn is_compatible(producer: &[ArgumentContract], consumer: &[ArgumentContract]) -> bool {
    producer.len() == consumer.len() && first_incompatible(producer, consumer).is_none()
}

fn first_incompatible(producer: &[ArgumentContract], consumer: &[ArgumentContract]) -> Option<usize> {
    producer
        .iter()
        .zip(consumer)
        .position(|(have, want)| !want.accepts(have))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> ArgumentContract {
        ArgumentContract::of::<i32>()
    }

    fn text() -> ArgumentContract {
        ArgumentContract::of::<String>()
    }

    #[test]
    fn test_matching_lists() {
        assert!(validate(&[int(), text()], &[int(), text()], Phase::Building).is_ok());
        assert!(validate(&[], &[], Phase::Building).is_ok());
    }

    #[test]
    fn test_arity_mismatch_carries_phase() {
        let err = validate(&[int()], &[int(), int()], Phase::Processing).unwrap_err();
        assert_eq!(err.phase, Phase::Processing);
        assert_eq!(err.position, None);
    }

    #[test]
    fn test_type_mismatch_reports_first_position() {
        let err = validate(&[int(), int(), text()], &[int(), text(), int()], Phase::Building)
            .unwrap_err();
        assert_eq!(err.position, Some(1));
    }

    #[test]
    fn test_erased_is_wildcard() {
        let erased = ArgumentContract::erased();
        assert!(validate(&[erased], &[int()], Phase::Building).is_ok());
        assert!(validate(&[text()], &[erased], Phase::Building).is_ok());
        assert!(!is_compatible(&[erased], &[int(), int()]));
    }

    #[test]
    fn test_validate_values() {
        let values = vec![ArgumentValue::new(5_i32), ArgumentValue::new("x".to_string())];
        assert!(validate_values(&[int(), text()], &values, Phase::Processing).is_ok());

        let err = validate_values(&[text(), int()], &values, Phase::Processing).unwrap_err();
        assert_eq!(err.position, Some(0));
    }
}
