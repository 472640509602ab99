use std::fmt;

use serde::{Deserialize, Serialize};

/// Dimensionality of every descriptor produced by the embedding model.
pub const DESCRIPTOR_DIM: usize = 128;

/// Opaque identifier of the account that owns an enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for IdentityId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for IdentityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Face descriptor: an ordered vector of embedding values.
///
/// Descriptors that come out of [`validate`](crate::validator::validate) are
/// guaranteed to hold exactly [`DESCRIPTOR_DIM`] finite values. Descriptors
/// rebuilt from storage via [`from_values`](Self::from_values) carry no such
/// guarantee; the matcher checks [`is_well_formed`](Self::is_well_formed)
/// before trusting them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor {
    values: Vec<f64>,
}

impl Descriptor {
    /// Wrap raw values without validation.
    pub fn from_values(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// True when the descriptor has [`DESCRIPTOR_DIM`] finite values.
    pub fn is_well_formed(&self) -> bool {
        self.values.len() == DESCRIPTOR_DIM && self.values.iter().all(|v| v.is_finite())
    }
}

/// Descriptors enrolled for one identity, in storage order.
///
/// Order has no bearing on correctness, but the matcher's early exit reports
/// whichever qualifying member it meets first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorGallery {
    descriptors: Vec<Descriptor>,
}

impl DescriptorGallery {
    pub fn new(descriptors: Vec<Descriptor>) -> Self {
        Self { descriptors }
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn into_descriptors(self) -> Vec<Descriptor> {
        self.descriptors
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Descriptor> {
        self.descriptors.iter()
    }
}

impl From<Vec<Descriptor>> for DescriptorGallery {
    fn from(descriptors: Vec<Descriptor>) -> Self {
        Self::new(descriptors)
    }
}

/// Enrollment state of one identity.
///
/// The gallery is non-empty exactly when `has_face_recognition` is set; the
/// transitions below are the only way to change either.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRecord {
    pub identity: IdentityId,
    pub gallery: DescriptorGallery,
    pub has_face_recognition: bool,
}

impl EnrollmentRecord {
    /// Record for a freshly provisioned identity.
    pub fn unenrolled(identity: IdentityId) -> Self {
        Self {
            identity,
            gallery: DescriptorGallery::default(),
            has_face_recognition: false,
        }
    }

    /// Rebuild a record from what the store returned (`None` means not found).
    pub fn from_loaded(identity: IdentityId, gallery: Option<DescriptorGallery>) -> Self {
        match gallery {
            Some(gallery) if !gallery.is_empty() => Self {
                identity,
                gallery,
                has_face_recognition: true,
            },
            _ => Self::unenrolled(identity),
        }
    }

    pub fn is_enrolled(&self) -> bool {
        self.has_face_recognition
    }

    /// Replace the gallery wholesale. An empty gallery leaves the record
    /// unenrolled.
    pub fn enroll(self, gallery: DescriptorGallery) -> (Self, EnrollmentSummary) {
        Self::replacing(self.identity, self.has_face_recognition, gallery)
    }

    /// Same transition as [`enroll`](Self::enroll) when only the prior
    /// enrollment flag is known, not the prior gallery.
    pub fn replacing(
        identity: IdentityId,
        was_enrolled: bool,
        gallery: DescriptorGallery,
    ) -> (Self, EnrollmentSummary) {
        let next = Self::from_loaded(identity, Some(gallery));
        let summary = EnrollmentSummary {
            has_face_recognition: next.has_face_recognition,
            descriptor_count: next.gallery.len(),
            was_update: was_enrolled,
        };
        (next, summary)
    }

    pub fn status(&self) -> EnrollmentStatus {
        EnrollmentStatus {
            identity: self.identity.clone(),
            has_face_recognition: self.has_face_recognition,
            descriptor_count: self.gallery.len(),
        }
    }
}

/// Outcome of a successful enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentSummary {
    pub has_face_recognition: bool,
    pub descriptor_count: usize,
    pub was_update: bool,
}

/// Enrollment state of an identity, without descriptor values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentStatus {
    pub identity: IdentityId,
    pub has_face_recognition: bool,
    pub descriptor_count: usize,
}

/// Verdict of comparing a query descriptor against a gallery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchVerdict {
    /// Smallest L2 distance found; `+inf` when nothing was compared.
    pub distance: f64,
    pub is_match: bool,
}

impl MatchVerdict {
    /// Verdict for an empty (or unenrolled) gallery.
    pub fn no_gallery() -> Self {
        Self {
            distance: f64::INFINITY,
            is_match: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(fill: f64) -> Descriptor {
        Descriptor::from_values(vec![fill; DESCRIPTOR_DIM])
    }

    #[test]
    fn test_well_formed_requires_dim_and_finite() {
        assert!(descriptor(0.1).is_well_formed());
        assert!(!Descriptor::from_values(vec![0.1; 64]).is_well_formed());

        let mut values = vec![0.0; DESCRIPTOR_DIM];
        values[7] = f64::NAN;
        assert!(!Descriptor::from_values(values).is_well_formed());
    }

    #[test]
    fn test_record_from_loaded_empty_gallery_is_unenrolled() {
        let record =
            EnrollmentRecord::from_loaded("alice".into(), Some(DescriptorGallery::default()));
        assert!(!record.is_enrolled());

        let record = EnrollmentRecord::from_loaded("alice".into(), None);
        assert!(!record.is_enrolled());
    }

    #[test]
    fn test_enroll_transition_reports_update() {
        let record = EnrollmentRecord::unenrolled("bob".into());
        let (record, first) = record.enroll(vec![descriptor(0.1)].into());
        assert!(first.has_face_recognition);
        assert!(!first.was_update);
        assert_eq!(first.descriptor_count, 1);

        let (record, second) = record.enroll(vec![descriptor(0.2), descriptor(0.3)].into());
        assert!(second.was_update);
        assert_eq!(second.descriptor_count, 2);
        assert_eq!(
            record.gallery.descriptors(),
            &[descriptor(0.2), descriptor(0.3)]
        );
    }

    #[test]
    fn test_replacing_uses_prior_flag() {
        let (record, summary) =
            EnrollmentRecord::replacing("carol".into(), true, vec![descriptor(0.5)].into());
        assert!(record.is_enrolled());
        assert!(summary.was_update);

        let (record, summary) =
            EnrollmentRecord::replacing("carol".into(), false, DescriptorGallery::default());
        assert!(!record.is_enrolled());
        assert!(!summary.was_update);
        assert_eq!(summary.descriptor_count, 0);
    }

    #[test]
    fn test_verdict_serializes_camel_case() {
        let verdict = MatchVerdict {
            distance: 0.25,
            is_match: true,
        };
        let json = serde_json::to_value(verdict).unwrap();
        assert_eq!(json["distance"], 0.25);
        assert_eq!(json["isMatch"], true);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = EnrollmentSummary {
            has_face_recognition: true,
            descriptor_count: 3,
            was_update: false,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["hasFaceRecognition"], true);
        assert_eq!(json["descriptorCount"], 3);
        assert_eq!(json["wasUpdate"], false);
    }
}
