//! Enrollment lifecycle: enroll, verify, identify, revoke.
//!
//! Enrollment reads only the prior enrollment flag from the store, applies a
//! pure transition on [`EnrollmentRecord`], then hands the result back in a
//! single save. Revocation clears without reading the gallery, so it works
//! even when stored descriptors can no longer be decoded. Input is fully
//! validated before the store is touched.

use serde::Deserialize;
use thiserror::Error;

use crate::aggregator::{average, AggregateError};
use crate::matcher::{EuclideanMatcher, MatchPolicy, MatchResult, Matcher};
use crate::store::{GalleryStore, StoreError};
use crate::types::{
    DescriptorGallery, EnrollmentRecord, EnrollmentStatus, EnrollmentSummary, IdentityId,
    MatchVerdict,
};
use crate::validator::{validate, validate_batch, BatchError, RawDescriptor, ValidationError};

#[derive(Error, Debug)]
pub enum EnrollmentError {
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("query descriptor rejected: {0}")]
    InvalidQuery(#[from] ValidationError),
    #[error("failed to aggregate samples: {0}")]
    Aggregate(#[from] AggregateError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EnrollmentError {
    /// True for errors caused by the request itself; resubmitting corrected
    /// input can succeed.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, EnrollmentError::Store(_))
    }
}

/// What enrollment writes into the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentPolicy {
    /// Keep every validated sample.
    #[default]
    AllSamples,
    /// Keep only the elementwise mean of the samples.
    Average,
}

/// Closest enrolled identity for a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    pub identity: IdentityId,
    pub verdict: MatchVerdict,
}

/// Orchestrates enrollment state changes over a [`GalleryStore`].
pub struct EnrollmentLifecycle<S, M = EuclideanMatcher> {
    store: S,
    matcher: M,
    policy: MatchPolicy,
    enrollment_policy: EnrollmentPolicy,
}

impl<S: GalleryStore> EnrollmentLifecycle<S, EuclideanMatcher> {
    pub fn new(store: S) -> Self {
        Self::with_matcher(store, EuclideanMatcher)
    }
}

impl<S: GalleryStore, M: Matcher> EnrollmentLifecycle<S, M> {
    pub fn with_matcher(store: S, matcher: M) -> Self {
        Self {
            store,
            matcher,
            policy: MatchPolicy::default(),
            enrollment_policy: EnrollmentPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_enrollment_policy(mut self, enrollment_policy: EnrollmentPolicy) -> Self {
        self.enrollment_policy = enrollment_policy;
        self
    }

    pub fn policy(&self) -> &MatchPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn matcher(&self) -> &M {
        &self.matcher
    }

    fn load_record(&self, identity: &IdentityId) -> Result<EnrollmentRecord, StoreError> {
        let gallery = self.store.load_gallery(identity)?;
        Ok(EnrollmentRecord::from_loaded(identity.clone(), gallery))
    }

    /// Replace the identity's gallery with the given samples.
    ///
    /// Rejects the whole batch if any sample is invalid; nothing is written
    /// in that case.
    pub fn enroll(
        &self,
        identity: &IdentityId,
        samples: &[RawDescriptor],
    ) -> Result<EnrollmentSummary, EnrollmentError> {
        let descriptors = validate_batch(samples).map_err(|err| {
            tracing::info!(identity = %identity, error = %err, "enrollment batch rejected");
            err
        })?;

        let gallery = match self.enrollment_policy {
            EnrollmentPolicy::AllSamples => DescriptorGallery::new(descriptors),
            EnrollmentPolicy::Average => DescriptorGallery::new(vec![average(&descriptors)?]),
        };

        let was_enrolled = self.store.is_enrolled(identity)?;
        let (record, summary) =
            EnrollmentRecord::replacing(identity.clone(), was_enrolled, gallery);
        self.store.save_gallery(identity, &record.gallery)?;

        tracing::info!(
            identity = %identity,
            samples = samples.len(),
            stored = summary.descriptor_count,
            was_update = summary.was_update,
            "enrolled face descriptors"
        );

        Ok(summary)
    }

    /// Compare a query against the identity's gallery.
    ///
    /// An unenrolled identity yields a non-matching verdict, not an error.
    pub fn verify(
        &self,
        identity: &IdentityId,
        query: &RawDescriptor,
    ) -> Result<MatchVerdict, EnrollmentError> {
        Ok(self.verify_detailed(identity, query)?.verdict)
    }

    /// Like [`verify`](Self::verify), with scan diagnostics.
    pub fn verify_detailed(
        &self,
        identity: &IdentityId,
        query: &RawDescriptor,
    ) -> Result<MatchResult, EnrollmentError> {
        let query = validate(query)?;
        let record = self.load_record(identity)?;

        if !record.is_enrolled() {
            tracing::debug!(identity = %identity, "verify against unenrolled identity");
        }

        let result = self
            .matcher
            .compare(&query, record.gallery.descriptors(), &self.policy);

        tracing::info!(
            identity = %identity,
            distance = result.verdict.distance,
            matched = result.verdict.is_match,
            "verification complete"
        );

        Ok(result)
    }

    /// Search every enrolled identity for the closest match.
    ///
    /// Returns `None` when no gallery matches. Among matching identities the
    /// smallest distance wins; ties go to the identity listed first by the
    /// store.
    pub fn identify(
        &self,
        query: &RawDescriptor,
    ) -> Result<Option<Identification>, EnrollmentError> {
        let query = validate(query)?;
        let mut best: Option<Identification> = None;

        for identity in self.store.enrolled_identities()? {
            let Some(gallery) = self.store.load_gallery(&identity)? else {
                continue;
            };
            let verdict = self
                .matcher
                .compare(&query, gallery.descriptors(), &self.policy)
                .verdict;
            if !verdict.is_match {
                continue;
            }

            let is_better = match &best {
                None => true,
                Some(prev) => verdict.distance < prev.verdict.distance,
            };
            if is_better {
                best = Some(Identification { identity, verdict });
            }
        }

        match &best {
            Some(found) => tracing::info!(
                identity = %found.identity,
                distance = found.verdict.distance,
                "identification matched"
            ),
            None => tracing::info!("identification found no match"),
        }

        Ok(best)
    }

    /// Remove the identity's gallery. Succeeds for unenrolled identities too.
    ///
    /// Only `clear_gallery` failures are errors; the prior-state lookup is
    /// for logging.
    pub fn revoke(&self, identity: &IdentityId) -> Result<(), EnrollmentError> {
        let was_enrolled = self
            .store
            .is_enrolled(identity)
            .map_err(|err| {
                tracing::warn!(
                    identity = %identity,
                    error = %err,
                    "could not read prior enrollment state"
                );
            })
            .ok();
        self.store.clear_gallery(identity)?;
        tracing::info!(
            identity = %identity,
            was_enrolled = ?was_enrolled,
            "face recognition revoked"
        );
        Ok(())
    }

    pub fn status(&self, identity: &IdentityId) -> Result<EnrollmentStatus, EnrollmentError> {
        Ok(self.load_record(identity)?.status())
    }
}
