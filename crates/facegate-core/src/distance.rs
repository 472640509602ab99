use thiserror::Error;

use crate::types::Descriptor;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceError {
    #[error("descriptor length mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Euclidean (L2) distance between two descriptors of equal length.
///
/// Symmetric, zero only for elementwise-equal inputs, and satisfies the
/// triangle inequality up to floating-point rounding.
pub fn euclidean_distance(a: &Descriptor, b: &Descriptor) -> Result<f64, DistanceError> {
    if a.dim() != b.dim() {
        return Err(DistanceError::DimensionMismatch {
            left: a.dim(),
            right: b.dim(),
        });
    }

    Ok(a.values()
        .iter()
        .zip(b.values().iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt())
}
