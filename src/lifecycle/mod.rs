//! Single-volume operations: create, attach, detach, delete, and the
//! delete-on-termination flag.
//!
//! Each operation resolves caller IDs through the [`MappingGateway`], talks
//! to the backends, and projects the result with [`crate::projection`].
//! Bulk listing lives in [`crate::describe`].

mod attach;
mod create;
mod delete;
mod detach;
mod flag;

use crate::backend::{BackendVolume, ComputeBackend, StorageBackend};
use crate::error::VolumeApiError;
use crate::ids::{BackendId, Ec2Id, ResourceKind};
use crate::mapping::{MappingGateway, MappingStore};
use crate::projection::{self, Volume, VolumeRefs};
use crate::reconcile::MappingReconciler;

/// Parameters accepted by [`VolumeService::create_volume`].
///
/// `iops`, `encrypted`, and `kms_key_id` are accepted for EC2 compatibility
/// and not forwarded to the backend.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CreateVolumeRequest {
    /// Target availability zone. Falls back to the service default.
    pub availability_zone: Option<String>,
    /// Size in GiB.
    pub size: Option<u64>,
    /// EC2 ID of the snapshot to restore from.
    pub snapshot_id: Option<Ec2Id>,
    /// Backend volume type.
    pub volume_type: Option<String>,
    /// Provisioned IOPS.
    pub iops: Option<u32>,
    /// Encryption request.
    pub encrypted: Option<bool>,
    /// KMS key identifier.
    pub kms_key_id: Option<String>,
}

impl CreateVolumeRequest {
    /// Checks that the request names either a size or a snapshot and that a
    /// given size is positive.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::MissingParameter`] or
    /// [`VolumeApiError::InvalidParameterValue`].
    pub fn validate(&self) -> Result<(), VolumeApiError> {
        if self.size.is_none() && self.snapshot_id.is_none() {
            return Err(VolumeApiError::MissingParameter {
                name: String::from("Size"),
            });
        }
        if self.size == Some(0) {
            return Err(VolumeApiError::InvalidParameterValue {
                name: String::from("Size"),
                reason: String::from("size must be at least 1 GiB"),
            });
        }
        Ok(())
    }
}

/// Parameters accepted by [`VolumeService::detach_volume`].
///
/// Only `volume_id` selects the attachment; the other fields are accepted
/// for EC2 compatibility.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DetachVolumeRequest {
    /// Volume to detach.
    pub volume_id: BackendId,
    /// EC2 ID of the instance the caller expects the volume on.
    pub instance_id: Option<Ec2Id>,
    /// Device the caller expects the volume on.
    pub device: Option<String>,
    /// Forced detachment.
    pub force: bool,
}

impl DetachVolumeRequest {
    /// Creates a request for the given volume with no optional fields.
    #[must_use]
    pub fn new(volume_id: impl Into<BackendId>) -> Self {
        Self {
            volume_id: volume_id.into(),
            instance_id: None,
            device: None,
            force: false,
        }
    }
}

/// EC2 volume API over a storage backend, a compute backend, and a mapping
/// store.
#[derive(Clone, Debug)]
pub struct VolumeService<S, C, M> {
    pub(crate) storage: S,
    pub(crate) compute: C,
    pub(crate) mapping: MappingGateway<M>,
    pub(crate) default_zone: Option<String>,
}

impl<S, C, M> VolumeService<S, C, M>
where
    S: StorageBackend,
    C: ComputeBackend,
    M: MappingStore,
{
    /// Wires the service to its collaborators.
    #[must_use]
    pub const fn new(storage: S, compute: C, mapping: M) -> Self {
        Self {
            storage,
            compute,
            mapping: MappingGateway::new(mapping),
            default_zone: None,
        }
    }

    /// Sets the availability zone used when a create request names none.
    #[must_use]
    pub fn with_default_zone(mut self, zone: Option<String>) -> Self {
        self.default_zone = zone.filter(|value| !value.trim().is_empty());
        self
    }

    /// Returns a reconciler sharing this service's collaborators.
    #[must_use]
    pub const fn reconciler(&self) -> MappingReconciler<'_, S, M> {
        MappingReconciler::new(&self.storage, &self.mapping)
    }

    async fn fetch_volume(&self, volume_id: &BackendId) -> Result<BackendVolume, VolumeApiError> {
        self.storage
            .get_volume(volume_id)
            .await
            .map_err(|err| VolumeApiError::from_volume_backend(err, volume_id.as_str()))
    }

    /// Projects a backend volume, resolving embedded IDs through the mapping
    /// store unless the caller already knows them.
    async fn project(
        &self,
        backend: &BackendVolume,
        snapshot_override: Option<Ec2Id>,
    ) -> Result<Volume, VolumeApiError> {
        let snapshot_id = match (snapshot_override, backend.snapshot_id.as_ref()) {
            (Some(ec2_id), _) => Some(ec2_id),
            (None, Some(backend_id)) => Some(
                self.mapping
                    .resolve_by_backend_id(ResourceKind::Snapshot, backend_id, None)
                    .await?
                    .ec2_id,
            ),
            (None, None) => None,
        };
        let instance_id = match backend.attached_server() {
            Some(server_id) if projection::volume_status(&backend.status).is_in_use() => Some(
                self.mapping
                    .resolve_by_backend_id(ResourceKind::Instance, server_id, None)
                    .await?
                    .ec2_id,
            ),
            _ => None,
        };
        Ok(projection::volume(
            backend,
            VolumeRefs {
                instance_id,
                snapshot_id,
            },
        ))
    }
}
