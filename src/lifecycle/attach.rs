//! Volume attachment.

use tracing::info;

use crate::backend::{ComputeBackend, StorageBackend};
use crate::error::VolumeApiError;
use crate::ids::{BackendId, Ec2Id, ResourceKind};
use crate::mapping::MappingStore;
use crate::projection::{self, Attachment};

use super::VolumeService;

impl<S, C, M> VolumeService<S, C, M>
where
    S: StorageBackend,
    C: ComputeBackend,
    M: MappingStore,
{
    /// Attaches a volume to an instance and reports the resulting
    /// attachment as the backend sees it right after the call.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::NotFound`] when the instance ID is unknown
    /// or the volume does not exist, and
    /// [`VolumeApiError::UnsupportedOperation`] when the backend refuses the
    /// attachment.
    pub async fn attach_volume(
        &self,
        volume_id: &BackendId,
        instance_id: &Ec2Id,
        device: &str,
    ) -> Result<Attachment, VolumeApiError> {
        let server_id = self
            .mapping
            .resolve(ResourceKind::Instance, instance_id)
            .await?;
        self.compute
            .attach_volume(&server_id, volume_id, device)
            .await
            .map_err(|err| VolumeApiError::from_volume_rejection(err, volume_id.as_str()))?;
        info!(
            volume_id = %volume_id,
            instance_id = %instance_id,
            device,
            "attached volume"
        );

        let volume = self.fetch_volume(volume_id).await?;
        Ok(projection::attachment(
            &volume,
            Some(instance_id.clone()),
            false,
        ))
    }
}
