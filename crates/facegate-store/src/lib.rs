//! facegate-store — Persistent gallery storage.
//!
//! SQLite-backed implementation of [`facegate_core::GalleryStore`]. Each
//! gallery replace or clear runs inside a single transaction, so a failure
//! never leaves an identity half-enrolled. Descriptor blobs can optionally be
//! sealed with AES-256-GCM.

pub mod codec;
pub mod crypto;
pub mod sqlite;

pub use crypto::{CryptoError, DescriptorCipher};
pub use sqlite::{SqliteGalleryStore, SqliteStoreError};
