//! Descriptor validation and numeric coercion.
//!
//! Clients may send descriptor components as JSON numbers or as
//! string-encoded numbers. Both are coerced here, once, into finite `f64`
//! values; anything that does not parse, or parses to NaN or infinity, is
//! rejected with the position of the offending component.

use serde::Deserialize;
use thiserror::Error;

use crate::types::{Descriptor, DESCRIPTOR_DIM};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("descriptor must have {expected} values, got {actual}")]
    BadDimensionality { expected: usize, actual: usize },
    #[error("descriptor value at position {position} is not a finite number: {value}")]
    NonNumericValue { position: usize, value: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BatchError {
    #[error("enrollment batch contains no samples")]
    EmptyBatch,
    #[error("sample {index} rejected: {source}")]
    InvalidBatch {
        index: usize,
        #[source]
        source: ValidationError,
    },
}

/// A single descriptor component as received from a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    /// Anything else (null, bool, nested structures). Always rejected.
    Other(serde_json::Value),
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

/// Descriptor as received from the capture collaborator, before validation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawDescriptor(pub Vec<RawValue>);

impl RawDescriptor {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f64>> for RawDescriptor {
    fn from(values: Vec<f64>) -> Self {
        RawDescriptor(values.into_iter().map(RawValue::Number).collect())
    }
}

impl From<&Descriptor> for RawDescriptor {
    fn from(descriptor: &Descriptor) -> Self {
        RawDescriptor::from(descriptor.values().to_vec())
    }
}

/// Check a raw descriptor and coerce it into a trusted [`Descriptor`].
pub fn validate(candidate: &RawDescriptor) -> Result<Descriptor, ValidationError> {
    if candidate.len() != DESCRIPTOR_DIM {
        return Err(ValidationError::BadDimensionality {
            expected: DESCRIPTOR_DIM,
            actual: candidate.len(),
        });
    }

    let values = candidate
        .0
        .iter()
        .enumerate()
        .map(|(position, raw)| coerce(position, raw))
        .collect::<Result<Vec<f64>, _>>()?;

    Ok(Descriptor::from_values(values))
}

/// Validate every sample of an enrollment batch. The batch is accepted only
/// if all samples pass; the first failing index is reported.
pub fn validate_batch(samples: &[RawDescriptor]) -> Result<Vec<Descriptor>, BatchError> {
    if samples.is_empty() {
        return Err(BatchError::EmptyBatch);
    }

    samples
        .iter()
        .enumerate()
        .map(|(index, sample)| {
            validate(sample).map_err(|source| BatchError::InvalidBatch { index, source })
        })
        .collect()
}

fn coerce(position: usize, raw: &RawValue) -> Result<f64, ValidationError> {
    let parsed = match raw {
        RawValue::Number(value) => Some(*value),
        RawValue::Text(text) => text.trim().parse::<f64>().ok(),
        RawValue::Other(_) => None,
    };

    match parsed {
        Some(value) if value.is_finite() => Ok(value),
        _ => Err(ValidationError::NonNumericValue {
            position,
            value: render(raw),
        }),
    }
}

fn render(raw: &RawValue) -> String {
    match raw {
        RawValue::Number(value) => value.to_string(),
        RawValue::Text(text) => format!("{text:?}"),
        RawValue::Other(value) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raw(fill: f64) -> RawDescriptor {
        RawDescriptor::from(vec![fill; DESCRIPTOR_DIM])
    }

    #[test]
    fn test_accepts_well_formed_descriptor() {
        let descriptor = validate(&raw(0.25)).unwrap();
        assert_eq!(descriptor.dim(), DESCRIPTOR_DIM);
        assert!(descriptor.values().iter().all(|&v| v == 0.25));
    }

    #[test]
    fn test_rejects_short_descriptor() {
        let err = validate(&RawDescriptor::from(vec![0.0; 127])).unwrap_err();
        assert_eq!(
            err,
            ValidationError::BadDimensionality {
                expected: 128,
                actual: 127
            }
        );
    }

    #[test]
    fn test_coerces_string_encoded_numbers() {
        let mut sample = raw(0.0);
        sample.0[3] = RawValue::from("-0.125");
        sample.0[4] = RawValue::from(" 1e-3 ");
        let descriptor = validate(&sample).unwrap();
        assert_eq!(descriptor.values()[3], -0.125);
        assert_eq!(descriptor.values()[4], 0.001);
    }

    #[test]
    fn test_rejects_unparseable_string() {
        let mut sample = raw(0.0);
        sample.0[10] = RawValue::from("abc");
        let err = validate(&sample).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::NonNumericValue { position: 10, .. }
        ));
    }

    #[test]
    fn test_rejects_non_finite_values() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let mut sample = raw(0.0);
            sample.0[0] = RawValue::Number(bad);
            assert!(matches!(
                validate(&sample),
                Err(ValidationError::NonNumericValue { position: 0, .. })
            ));
        }

        let mut sample = raw(0.0);
        sample.0[1] = RawValue::from("NaN");
        assert!(matches!(
            validate(&sample),
            Err(ValidationError::NonNumericValue { position: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_null_and_bool_from_json() {
        let mut values: Vec<serde_json::Value> = vec![serde_json::json!(0.5); DESCRIPTOR_DIM];
        values[5] = serde_json::Value::Null;
        values[6] = serde_json::Value::Bool(true);
        let sample: RawDescriptor =
            serde_json::from_value(serde_json::Value::Array(values)).unwrap();
        assert!(matches!(
            validate(&sample),
            Err(ValidationError::NonNumericValue { position: 5, .. })
        ));
    }

    #[test]
    fn test_deserializes_mixed_numbers_and_strings() {
        let mut values: Vec<serde_json::Value> = vec![serde_json::json!(0.5); DESCRIPTOR_DIM];
        values[0] = serde_json::json!("0.75");
        let sample: RawDescriptor =
            serde_json::from_value(serde_json::Value::Array(values)).unwrap();
        let descriptor = validate(&sample).unwrap();
        assert_eq!(descriptor.values()[0], 0.75);
    }

    #[test]
    fn test_batch_empty() {
        assert_eq!(validate_batch(&[]).unwrap_err(), BatchError::EmptyBatch);
    }

    #[test]
    fn test_batch_reports_failing_index() {
        let mut samples = vec![raw(0.1), raw(0.2), raw(0.3)];
        samples[2].0.pop();
        let err = validate_batch(&samples).unwrap_err();
        match err {
            BatchError::InvalidBatch { index, source } => {
                assert_eq!(index, 2);
                assert!(matches!(
                    source,
                    ValidationError::BadDimensionality { actual: 127, .. }
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn prop_accepts_only_exact_dimension(len in 0usize..300) {
            let result = validate(&RawDescriptor::from(vec![0.5; len]));
            if len == DESCRIPTOR_DIM {
                prop_assert!(result.is_ok());
            } else {
                let is_bad_dim = matches!(
                    result,
                    Err(ValidationError::BadDimensionality { actual, .. }) if actual == len
                );
                prop_assert!(is_bad_dim);
            }
        }

        #[test]
        fn prop_accepts_any_finite_values(
            values in prop::collection::vec(-1.0e6f64..1.0e6, DESCRIPTOR_DIM)
        ) {
            let descriptor = validate(&RawDescriptor::from(values.clone())).unwrap();
            prop_assert_eq!(descriptor.values(), values.as_slice());
        }
    }
}
