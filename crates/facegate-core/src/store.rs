//! Storage collaborator interface for enrollment galleries.
//!
//! Implementations must make `save_gallery` and `clear_gallery` atomic: a
//! failed call leaves the previous gallery untouched. Concurrent writers for
//! one identity are last-write-wins unless the implementation serializes
//! them itself.

use std::collections::BTreeMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::types::{DescriptorGallery, IdentityId};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Infrastructure failure reported by a storage backend. Opaque to the core.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("gallery store unavailable: {0}")]
    Backend(#[source] BoxError),
}

impl StoreError {
    pub fn backend(err: impl Into<BoxError>) -> Self {
        StoreError::Backend(err.into())
    }
}

pub trait GalleryStore {
    /// Load the enrolled gallery; `None` when the identity is not enrolled.
    fn load_gallery(&self, identity: &IdentityId) -> Result<Option<DescriptorGallery>, StoreError>;
    /// Replace the identity's gallery wholesale and mark it enrolled.
    fn save_gallery(
        &self,
        identity: &IdentityId,
        gallery: &DescriptorGallery,
    ) -> Result<(), StoreError>;
    /// Drop the identity's gallery and mark it unenrolled.
    fn clear_gallery(&self, identity: &IdentityId) -> Result<(), StoreError>;
    /// All identities that currently have a gallery, in a stable order.
    fn enrolled_identities(&self) -> Result<Vec<IdentityId>, StoreError>;

    /// Whether the identity has a gallery. Backends should answer without
    /// decoding descriptors.
    fn is_enrolled(&self, identity: &IdentityId) -> Result<bool, StoreError> {
        Ok(self.load_gallery(identity)?.is_some())
    }
}

impl<T: GalleryStore + ?Sized> GalleryStore for &T {
    fn load_gallery(&self, identity: &IdentityId) -> Result<Option<DescriptorGallery>, StoreError> {
        (**self).load_gallery(identity)
    }

    fn save_gallery(
        &self,
        identity: &IdentityId,
        gallery: &DescriptorGallery,
    ) -> Result<(), StoreError> {
        (**self).save_gallery(identity, gallery)
    }

    fn clear_gallery(&self, identity: &IdentityId) -> Result<(), StoreError> {
        (**self).clear_gallery(identity)
    }

    fn enrolled_identities(&self) -> Result<Vec<IdentityId>, StoreError> {
        (**self).enrolled_identities()
    }

    fn is_enrolled(&self, identity: &IdentityId) -> Result<bool, StoreError> {
        (**self).is_enrolled(identity)
    }
}

/// In-process store, keyed by identity in sorted order.
#[derive(Debug, Default)]
pub struct MemoryGalleryStore {
    galleries: RwLock<BTreeMap<IdentityId, DescriptorGallery>>,
}

impl MemoryGalleryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::backend("memory store lock poisoned")
}

impl GalleryStore for MemoryGalleryStore {
    fn load_gallery(&self, identity: &IdentityId) -> Result<Option<DescriptorGallery>, StoreError> {
        let galleries = self.galleries.read().map_err(poisoned)?;
        Ok(galleries.get(identity).cloned())
    }

    fn save_gallery(
        &self,
        identity: &IdentityId,
        gallery: &DescriptorGallery,
    ) -> Result<(), StoreError> {
        let mut galleries = self.galleries.write().map_err(poisoned)?;
        if gallery.is_empty() {
            galleries.remove(identity);
        } else {
            galleries.insert(identity.clone(), gallery.clone());
        }
        Ok(())
    }

    fn clear_gallery(&self, identity: &IdentityId) -> Result<(), StoreError> {
        let mut galleries = self.galleries.write().map_err(poisoned)?;
        galleries.remove(identity);
        Ok(())
    }

    fn enrolled_identities(&self) -> Result<Vec<IdentityId>, StoreError> {
        let galleries = self.galleries.read().map_err(poisoned)?;
        Ok(galleries.keys().cloned().collect())
    }

    fn is_enrolled(&self, identity: &IdentityId) -> Result<bool, StoreError> {
        let galleries = self.galleries.read().map_err(poisoned)?;
        Ok(galleries.contains_key(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Descriptor;

    fn gallery(fills: &[f64]) -> DescriptorGallery {
        fills
            .iter()
            .map(|&f| Descriptor::from_values(vec![f; 4]))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_missing_identity_loads_none() {
        let store = MemoryGalleryStore::new();
        assert!(store.load_gallery(&"nobody".into()).unwrap().is_none());
    }

    #[test]
    fn test_save_replaces_and_clear_removes() {
        let store = MemoryGalleryStore::new();
        let id = IdentityId::from("dana");
        store.save_gallery(&id, &gallery(&[0.1])).unwrap();
        store.save_gallery(&id, &gallery(&[0.2, 0.3])).unwrap();
        assert_eq!(store.load_gallery(&id).unwrap(), Some(gallery(&[0.2, 0.3])));

        store.clear_gallery(&id).unwrap();
        assert!(store.load_gallery(&id).unwrap().is_none());
        store.clear_gallery(&id).unwrap();
    }

    #[test]
    fn test_enrolled_identities_sorted() {
        let store = MemoryGalleryStore::new();
        store.save_gallery(&"zed".into(), &gallery(&[0.1])).unwrap();
        store.save_gallery(&"amy".into(), &gallery(&[0.1])).unwrap();
        assert_eq!(
            store.enrolled_identities().unwrap(),
            vec![IdentityId::from("amy"), IdentityId::from("zed")]
        );
    }

    #[test]
    fn test_backend_error_display() {
        let err = StoreError::backend("connection refused");
        assert_eq!(err.to_string(), "gallery store unavailable: connection refused");
    }
}
