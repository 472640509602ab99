//! Summary statistics over same-person samples.
//!
//! Enrollment keeps every raw sample by default: more gallery members give
//! the matcher more chances to land under the early-exit threshold, at the
//! cost of storage and worst-case scan time. Averaging is available for
//! callers that prefer a single compact template.

use thiserror::Error;

use crate::types::Descriptor;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("cannot average an empty set of descriptors")]
    EmptyInput,
    #[error("descriptor {index} has {actual} values, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
    #[error("mean is not finite at position {position}")]
    NonFiniteMean { position: usize },
}

/// Elementwise arithmetic mean of the given samples.
///
/// Each term is scaled by `1/n` before summing, so finite inputs cannot
/// overflow. A non-finite result (from non-finite input) is rejected.
pub fn average(samples: &[Descriptor]) -> Result<Descriptor, AggregateError> {
    let first = samples.first().ok_or(AggregateError::EmptyInput)?;
    let dim = first.dim();
    let count = samples.len() as f64;

    let mut mean = vec![0.0f64; dim];
    for (index, sample) in samples.iter().enumerate() {
        if sample.dim() != dim {
            return Err(AggregateError::DimensionMismatch {
                index,
                expected: dim,
                actual: sample.dim(),
            });
        }
        for (acc, value) in mean.iter_mut().zip(sample.values()) {
            *acc += value / count;
        }
    }

    if let Some(position) = mean.iter().position(|v| !v.is_finite()) {
        return Err(AggregateError::NonFiniteMean { position });
    }
    Ok(Descriptor::from_values(mean))
}
