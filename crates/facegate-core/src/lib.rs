//! facegate-core — Face-descriptor authentication engine.
//!
//! Validates 128-dimensional face descriptors produced by an external
//! embedding model, compares them by Euclidean distance against an enrolled
//! gallery, and manages the enroll/verify/revoke lifecycle through a narrow
//! storage trait. No pixels, no model inference, no wire formats.

pub mod aggregator;
pub mod distance;
pub mod enrollment;
pub mod matcher;
pub mod store;
pub mod types;
pub mod validator;

pub use aggregator::{average, AggregateError};
pub use distance::{euclidean_distance, DistanceError};
pub use enrollment::{EnrollmentError, EnrollmentLifecycle, EnrollmentPolicy, Identification};
pub use matcher::{match_gallery, EuclideanMatcher, MatchPolicy, MatchResult, Matcher, PolicyError};
pub use store::{GalleryStore, MemoryGalleryStore, StoreError};
pub use types::{
    Descriptor, DescriptorGallery, EnrollmentRecord, EnrollmentStatus, EnrollmentSummary,
    IdentityId, MatchVerdict, DESCRIPTOR_DIM,
};
pub use validator::{validate, validate_batch, BatchError, RawDescriptor, RawValue, ValidationError};
