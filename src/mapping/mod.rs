//! EC2 ID to backend ID mapping.
//!
//! The [`MappingStore`] trait is the contract with whatever persists the
//! ID table. [`MappingGateway`] layers the lookups the operations need on
//! top of it: strict resolution of caller-supplied IDs, reverse resolution
//! with lazy entry creation, and per-call [`CrossReference`] snapshots for
//! bulk work. Nothing here caches across calls.

pub mod file_store;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::error::VolumeApiError;
use crate::ids::{BackendId, Ec2Id, ResourceKind};

pub use file_store::JsonMappingStore;

/// One row of the ID mapping table.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MappingItem {
    /// Caller-facing identifier.
    pub ec2_id: Ec2Id,
    /// Backend identifier the EC2 ID stands for.
    pub backend_id: BackendId,
    /// Resource kind.
    pub kind: ResourceKind,
}

/// Errors raised by mapping store implementations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum MappingStoreError {
    /// Reading or writing the underlying storage failed.
    #[error("failed to access mapping store at {location}: {message}")]
    Io {
        /// Where the store lives (path, DSN, ...).
        location: String,
        /// Human-readable error message.
        message: String,
    },
    /// Stored content could not be decoded.
    #[error("corrupt mapping store at {location}: {message}")]
    Corrupt {
        /// Where the store lives.
        location: String,
        /// Decoder error message.
        message: String,
    },
    /// The store refused the write.
    #[error("mapping store rejected {operation}: {message}")]
    Rejected {
        /// Operation being attempted.
        operation: String,
        /// Reason given by the store.
        message: String,
    },
}

/// Future returned by mapping store operations.
pub type StoreFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, MappingStoreError>> + Send + 'a>>;

/// Persistent EC2 ID mapping table.
pub trait MappingStore: Send + Sync {
    /// Looks up an entry by EC2 ID.
    fn get_item<'a>(&'a self, ec2_id: &'a Ec2Id) -> StoreFuture<'a, Option<MappingItem>>;

    /// Looks up an entry by kind and backend ID.
    fn get_item_by_backend_id<'a>(
        &'a self,
        kind: ResourceKind,
        backend_id: &'a BackendId,
    ) -> StoreFuture<'a, Option<MappingItem>>;

    /// Lists all entries of a kind in insertion order.
    fn list_items(&self, kind: ResourceKind) -> StoreFuture<'_, Vec<MappingItem>>;

    /// Adds an entry for a backend ID, generating a fresh EC2 ID.
    fn add_item<'a>(
        &'a self,
        kind: ResourceKind,
        backend_id: &'a BackendId,
    ) -> StoreFuture<'a, MappingItem>;

    /// Removes an entry. Removing an absent entry is not an error.
    fn delete_item<'a>(&'a self, ec2_id: &'a Ec2Id) -> StoreFuture<'a, ()>;
}

/// Point-in-time view of one kind's mapping entries, keyed by backend ID.
///
/// When the table holds several entries for one backend ID the first one
/// listed wins.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CrossReference {
    kind: Option<ResourceKind>,
    by_backend_id: HashMap<BackendId, MappingItem>,
}

impl CrossReference {
    /// Builds a cross-reference from listed entries.
    #[must_use]
    pub fn from_items(kind: ResourceKind, items: Vec<MappingItem>) -> Self {
        let mut by_backend_id = HashMap::with_capacity(items.len());
        for item in items.into_iter().filter(|item| item.kind == kind) {
            by_backend_id
                .entry(item.backend_id.clone())
                .or_insert(item);
        }
        Self {
            kind: Some(kind),
            by_backend_id,
        }
    }

    /// Returns the entry for a backend ID.
    #[must_use]
    pub fn get(&self, backend_id: &BackendId) -> Option<&MappingItem> {
        self.by_backend_id.get(backend_id)
    }

    /// Returns the EC2 ID for a backend ID.
    #[must_use]
    pub fn ec2_id_for(&self, backend_id: &BackendId) -> Option<&Ec2Id> {
        self.get(backend_id).map(|item| &item.ec2_id)
    }

    /// Whether the cross-reference was built for the given kind.
    #[must_use]
    pub fn covers(&self, kind: ResourceKind) -> bool {
        self.kind == Some(kind)
    }

    /// Number of distinct backend IDs covered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_backend_id.len()
    }

    /// Whether the cross-reference is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_backend_id.is_empty()
    }
}

/// Resolves identifiers between the EC2 and backend ID spaces.
#[derive(Clone, Debug)]
pub struct MappingGateway<M> {
    store: M,
}

impl<M: MappingStore> MappingGateway<M> {
    /// Wraps a mapping store.
    #[must_use]
    pub const fn new(store: M) -> Self {
        Self { store }
    }

    /// Resolves a caller-supplied EC2 ID to its backend ID.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::NotFound`] when no entry of the requested
    /// kind exists, or [`VolumeApiError::MappingStore`] when the store fails.
    pub async fn resolve(
        &self,
        kind: ResourceKind,
        ec2_id: &Ec2Id,
    ) -> Result<BackendId, VolumeApiError> {
        match self.store.get_item(ec2_id).await? {
            Some(item) if item.kind == kind => Ok(item.backend_id),
            _ => Err(VolumeApiError::not_found(kind, ec2_id.as_str())),
        }
    }

    /// Returns the mapping entry for a backend object, creating one when
    /// the object has never been seen before.
    ///
    /// A prefetched cross-reference for the same kind short-circuits the
    /// store lookup.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::MappingStore`] when the store fails.
    pub async fn resolve_by_backend_id(
        &self,
        kind: ResourceKind,
        backend_id: &BackendId,
        prefetched: Option<&CrossReference>,
    ) -> Result<MappingItem, VolumeApiError> {
        let cached = prefetched
            .filter(|xref| xref.covers(kind))
            .and_then(|xref| xref.get(backend_id).cloned());
        if let Some(item) = cached {
            return Ok(item);
        }
        if let Some(item) = self.store.get_item_by_backend_id(kind, backend_id).await? {
            return Ok(item);
        }
        let item = self.store.add_item(kind, backend_id).await?;
        debug!(
            kind = %kind,
            backend_id = %backend_id,
            ec2_id = %item.ec2_id,
            "registered mapping for previously unseen backend object"
        );
        Ok(item)
    }

    /// Loads every entry of a kind into a [`CrossReference`].
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::MappingStore`] when the store fails.
    pub async fn cross_reference(
        &self,
        kind: ResourceKind,
    ) -> Result<CrossReference, VolumeApiError> {
        let items = self.store.list_items(kind).await?;
        Ok(CrossReference::from_items(kind, items))
    }

    /// Lists every entry of a kind.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::MappingStore`] when the store fails.
    pub async fn list(&self, kind: ResourceKind) -> Result<Vec<MappingItem>, VolumeApiError> {
        self.store.list_items(kind).await.map_err(Into::into)
    }

    /// Adds an entry for a newly created backend object.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::MappingStore`] when the store fails.
    pub async fn add(
        &self,
        kind: ResourceKind,
        backend_id: &BackendId,
    ) -> Result<MappingItem, VolumeApiError> {
        self.store.add_item(kind, backend_id).await.map_err(Into::into)
    }

    /// Removes an entry.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::MappingStore`] when the store fails.
    pub async fn remove(&self, ec2_id: &Ec2Id) -> Result<(), VolumeApiError> {
        self.store.delete_item(ec2_id).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::InMemoryMappingStore;

    fn gateway() -> MappingGateway<InMemoryMappingStore> {
        let store = InMemoryMappingStore::new();
        store.seed(ResourceKind::Instance, "i-00000001", "bi-1");
        store.seed(ResourceKind::Snapshot, "snap-00000001", "bs-1");
        MappingGateway::new(store)
    }

    #[tokio::test]
    async fn resolve_returns_backend_id() {
        let backend_id = gateway()
            .resolve(ResourceKind::Instance, &Ec2Id::from("i-00000001"))
            .await
            .expect("known instance");
        assert_eq!(backend_id, BackendId::from("bi-1"));
    }

    #[tokio::test]
    async fn resolve_rejects_unknown_id() {
        let err = gateway()
            .resolve(ResourceKind::Instance, &Ec2Id::from("i-0000ffff"))
            .await
            .expect_err("unknown instance");
        assert_eq!(err.code(), "InvalidInstanceID.NotFound");
    }

    #[tokio::test]
    async fn resolve_rejects_kind_mismatch() {
        let err = gateway()
            .resolve(ResourceKind::Instance, &Ec2Id::from("snap-00000001"))
            .await
            .expect_err("snapshot is not an instance");
        assert!(matches!(
            err,
            VolumeApiError::NotFound {
                kind: ResourceKind::Instance,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn reverse_resolution_prefers_prefetched_entries() {
        let gw = gateway();
        let xref = CrossReference::from_items(
            ResourceKind::Instance,
            vec![MappingItem {
                ec2_id: Ec2Id::from("i-prefetch"),
                backend_id: BackendId::from("bi-1"),
                kind: ResourceKind::Instance,
            }],
        );
        let item = gw
            .resolve_by_backend_id(ResourceKind::Instance, &BackendId::from("bi-1"), Some(&xref))
            .await
            .expect("prefetched");
        assert_eq!(item.ec2_id, Ec2Id::from("i-prefetch"));
    }

    #[tokio::test]
    async fn reverse_resolution_creates_missing_entries() {
        let gw = gateway();
        let item = gw
            .resolve_by_backend_id(ResourceKind::Instance, &BackendId::from("bi-new"), None)
            .await
            .expect("lazily created");
        assert_eq!(ResourceKind::of(&item.ec2_id), Some(ResourceKind::Instance));
        assert_ne!(item.ec2_id, Ec2Id::from("i-00000001"));
        let owner = gw
            .resolve(ResourceKind::Instance, &Ec2Id::from("i-00000001"))
            .await
            .expect("seeded entry");
        assert_eq!(owner, BackendId::from("bi-1"));

        let again = gw
            .resolve_by_backend_id(ResourceKind::Instance, &BackendId::from("bi-new"), None)
            .await
            .expect("existing");
        assert_eq!(again.ec2_id, item.ec2_id);
    }

    #[test]
    fn cross_reference_keeps_first_match() {
        let items = vec![
            MappingItem {
                ec2_id: Ec2Id::from("i-first"),
                backend_id: BackendId::from("bi-1"),
                kind: ResourceKind::Instance,
            },
            MappingItem {
                ec2_id: Ec2Id::from("i-second"),
                backend_id: BackendId::from("bi-1"),
                kind: ResourceKind::Instance,
            },
        ];
        let xref = CrossReference::from_items(ResourceKind::Instance, items);
        assert_eq!(xref.len(), 1);
        assert_eq!(
            xref.ec2_id_for(&BackendId::from("bi-1")),
            Some(&Ec2Id::from("i-first"))
        );
    }
}
