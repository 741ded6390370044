//! Volume detachment.

use tracing::{debug, info};

use crate::backend::{ComputeBackend, StorageBackend};
use crate::error::VolumeApiError;
use crate::ids::ResourceKind;
use crate::mapping::MappingStore;
use crate::projection::{self, Attachment};

use super::{DetachVolumeRequest, VolumeService};

impl<S, C, M> VolumeService<S, C, M>
where
    S: StorageBackend,
    C: ComputeBackend,
    M: MappingStore,
{
    /// Detaches a volume from whichever server its first attachment record
    /// names.
    ///
    /// The server is mapped back to an EC2 instance ID by scanning the
    /// known instances; an unknown server yields no instance ID rather than
    /// a new mapping entry.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::IncorrectState`] when the volume has no
    /// attachment, in which case the backend detach is never called, and
    /// [`VolumeApiError::NotFound`] when the volume does not exist.
    pub async fn detach_volume(
        &self,
        request: &DetachVolumeRequest,
    ) -> Result<Attachment, VolumeApiError> {
        let volume_id = &request.volume_id;
        let volume = self.fetch_volume(volume_id).await?;
        let Some(server_id) = volume.attached_server().cloned() else {
            return Err(VolumeApiError::IncorrectState {
                reason: format!("Volume {volume_id} is not attached to anything"),
            });
        };
        if request.instance_id.is_some() || request.device.is_some() || request.force {
            debug!(
                instance_id = ?request.instance_id,
                device = ?request.device,
                force = request.force,
                "detach selects the attachment from backend state; caller hints ignored"
            );
        }

        self.compute
            .detach_volume(&server_id, volume_id)
            .await
            .map_err(|err| VolumeApiError::from_volume_rejection(err, volume_id.as_str()))?;
        info!(volume_id = %volume_id, server_id = %server_id, "detached volume");

        let refreshed = self.fetch_volume(volume_id).await?;
        let instances = self.mapping.cross_reference(ResourceKind::Instance).await?;
        let instance_id = instances.ec2_id_for(&server_id).cloned();
        Ok(projection::attachment(&refreshed, instance_id, false))
    }
}
