//! Nearest-neighbor matching of a query descriptor against a gallery.

use thiserror::Error;

use crate::distance::euclidean_distance;
use crate::types::{Descriptor, MatchVerdict};

/// Default maximum L2 distance for a same-person match.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;
/// Default distance at which the scan stops looking for a closer member.
pub const DEFAULT_EARLY_EXIT_THRESHOLD: f64 = 0.3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PolicyError {
    #[error("match threshold must be finite and non-negative, got {0}")]
    InvalidThreshold(f64),
    #[error("early-exit threshold must be finite and non-negative, got {0}")]
    InvalidEarlyExit(f64),
    #[error("early-exit threshold {early_exit} exceeds match threshold {threshold}")]
    EarlyExitAboveThreshold { early_exit: f64, threshold: f64 },
}

/// Thresholds applied by the matcher.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    /// A gallery matches when its closest member is at most this far away.
    pub threshold: f64,
    /// Stop scanning once a member at most this far away is found.
    /// `None` scans the whole gallery and reports the true minimum.
    pub early_exit_threshold: Option<f64>,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_MATCH_THRESHOLD,
            early_exit_threshold: Some(DEFAULT_EARLY_EXIT_THRESHOLD),
        }
    }
}

impl MatchPolicy {
    pub fn new(threshold: f64, early_exit_threshold: Option<f64>) -> Result<Self, PolicyError> {
        let policy = Self {
            threshold,
            early_exit_threshold,
        };
        policy.validate()?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(PolicyError::InvalidThreshold(self.threshold));
        }
        if let Some(early_exit) = self.early_exit_threshold {
            if !early_exit.is_finite() || early_exit < 0.0 {
                return Err(PolicyError::InvalidEarlyExit(early_exit));
            }
            if early_exit > self.threshold {
                return Err(PolicyError::EarlyExitAboveThreshold {
                    early_exit,
                    threshold: self.threshold,
                });
            }
        }
        Ok(())
    }
}

/// Verdict plus scan diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    pub verdict: MatchVerdict,
    /// Gallery index of the member that produced `verdict.distance`.
    pub closest_index: Option<usize>,
    /// Members actually compared against the query.
    pub compared: usize,
    /// Malformed members passed over.
    pub skipped: usize,
    pub stopped_early: bool,
}

impl MatchResult {
    fn empty() -> Self {
        Self {
            verdict: MatchVerdict::no_gallery(),
            closest_index: None,
            compared: 0,
            skipped: 0,
            stopped_early: false,
        }
    }
}

/// Strategy for comparing a query descriptor against a gallery.
pub trait Matcher {
    fn compare(&self, query: &Descriptor, gallery: &[Descriptor], policy: &MatchPolicy)
        -> MatchResult;
}

impl<T: Matcher + ?Sized> Matcher for &T {
    fn compare(
        &self,
        query: &Descriptor,
        gallery: &[Descriptor],
        policy: &MatchPolicy,
    ) -> MatchResult {
        (**self).compare(query, gallery, policy)
    }
}

/// Euclidean nearest-neighbor matcher.
///
/// Scans in gallery order and keeps the first member seen at the smallest
/// distance. With an early-exit threshold set, the scan stops at the first
/// member within it, so the reported distance depends on gallery order when
/// several members qualify.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(
        &self,
        query: &Descriptor,
        gallery: &[Descriptor],
        policy: &MatchPolicy,
    ) -> MatchResult {
        let mut result = MatchResult::empty();
        let mut best = f64::INFINITY;

        for (i, member) in gallery.iter().enumerate() {
            if !member.is_well_formed() {
                tracing::warn!(index = i, dim = member.dim(), "skipping malformed gallery member");
                result.skipped += 1;
                continue;
            }

            let distance = match euclidean_distance(query, member) {
                Ok(distance) => distance,
                Err(err) => {
                    tracing::warn!(index = i, error = %err, "skipping incomparable gallery member");
                    result.skipped += 1;
                    continue;
                }
            };
            result.compared += 1;

            if distance < best {
                best = distance;
                result.closest_index = Some(i);
            }

            if let Some(early_exit) = policy.early_exit_threshold {
                if best <= early_exit {
                    result.stopped_early = true;
                    break;
                }
            }
        }

        result.verdict = MatchVerdict {
            distance: best,
            is_match: best <= policy.threshold,
        };

        tracing::debug!(
            distance = best,
            is_match = result.verdict.is_match,
            compared = result.compared,
            skipped = result.skipped,
            stopped_early = result.stopped_early,
            "gallery scan complete"
        );

        result
    }
}

/// Match a query against a gallery with explicit thresholds.
pub fn match_gallery(
    query: &Descriptor,
    gallery: &[Descriptor],
    threshold: f64,
    early_exit_threshold: f64,
) -> MatchVerdict {
    let policy = MatchPolicy {
        threshold,
        early_exit_threshold: Some(early_exit_threshold),
    };
    EuclideanMatcher.compare(query, gallery, &policy).verdict
}
