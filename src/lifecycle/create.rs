//! Volume creation with rollback of partial work.

use tracing::{debug, info};

use crate::backend::{BackendVolumeRequest, ComputeBackend, StorageBackend};
use crate::compensation::{CompensationScope, UndoError};
use crate::error::VolumeApiError;
use crate::ids::ResourceKind;
use crate::mapping::MappingStore;
use crate::projection::Volume;

use super::{CreateVolumeRequest, VolumeService};

impl<S, C, M> VolumeService<S, C, M>
where
    S: StorageBackend,
    C: ComputeBackend,
    M: MappingStore,
{
    /// Allocates a backend volume and registers its EC2 ID.
    ///
    /// When registering the mapping entry fails, the freshly allocated
    /// backend volume is deleted again before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::MissingParameter`] or
    /// [`VolumeApiError::InvalidParameterValue`] for malformed requests,
    /// [`VolumeApiError::NotFound`] when the snapshot ID is unknown, and
    /// [`VolumeApiError::Backend`] or [`VolumeApiError::MappingStore`] when a
    /// collaborator fails.
    pub async fn create_volume(
        &self,
        request: CreateVolumeRequest,
    ) -> Result<Volume, VolumeApiError> {
        request.validate()?;
        if request.iops.is_some() || request.encrypted.is_some() || request.kms_key_id.is_some() {
            debug!(
                iops = ?request.iops,
                encrypted = ?request.encrypted,
                kms_key_id = ?request.kms_key_id,
                "ignoring unsupported create-volume parameters"
            );
        }

        let snapshot_backend_id = match request.snapshot_id.as_ref() {
            Some(ec2_id) => Some(self.mapping.resolve(ResourceKind::Snapshot, ec2_id).await?),
            None => None,
        };
        let backend_request = BackendVolumeRequest {
            size: request.size,
            snapshot_id: snapshot_backend_id,
            volume_type: request.volume_type,
            availability_zone: request
                .availability_zone
                .or_else(|| self.default_zone.clone()),
        };

        let mut scope = CompensationScope::new("create volume");
        let created = self.storage.create_volume(&backend_request).await?;
        let storage = &self.storage;
        let allocated_id = created.id.clone();
        scope.register("delete backend volume", move || {
            Box::pin(async move {
                storage
                    .delete_volume(&allocated_id)
                    .await
                    .map_err(UndoError::from)
            })
        });

        let item = scope
            .check(self.mapping.add(ResourceKind::Volume, &created.id).await)
            .await?;
        let mapping = &self.mapping;
        let registered_id = item.ec2_id.clone();
        scope.register("delete mapping entry", move || {
            Box::pin(async move { mapping.remove(&registered_id).await.map_err(UndoError::from) })
        });

        let projected = scope
            .check(self.project(&created, request.snapshot_id).await)
            .await?;
        scope.commit();

        info!(
            volume_id = %created.id,
            ec2_id = %item.ec2_id,
            status = %created.status,
            "created volume"
        );
        Ok(projected)
    }
}
