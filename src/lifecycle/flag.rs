//! Delete-on-termination flag pass-through.

use tracing::info;

use crate::backend::{ComputeBackend, DeleteOnTerminationFlag, StorageBackend};
use crate::error::VolumeApiError;
use crate::ids::BackendId;
use crate::mapping::MappingStore;

use super::VolumeService;

impl<S, C, M> VolumeService<S, C, M>
where
    S: StorageBackend,
    C: ComputeBackend,
    M: MappingStore,
{
    /// Reads the delete-on-termination flag of a volume.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::UnsupportedOperation`] when the backend
    /// rejects the request.
    pub async fn show_delete_on_termination(
        &self,
        volume_id: &BackendId,
    ) -> Result<DeleteOnTerminationFlag, VolumeApiError> {
        self.compute
            .delete_on_termination(volume_id)
            .await
            .map_err(|err| VolumeApiError::from_volume_rejection(err, volume_id.as_str()))
    }

    /// Updates the delete-on-termination flag of a volume.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::UnsupportedOperation`] when the backend
    /// rejects the update.
    pub async fn update_delete_on_termination(
        &self,
        volume_id: &BackendId,
        delete_on_termination: bool,
    ) -> Result<DeleteOnTerminationFlag, VolumeApiError> {
        let flag = self
            .compute
            .set_delete_on_termination(volume_id, delete_on_termination)
            .await
            .map_err(|err| VolumeApiError::from_volume_rejection(err, volume_id.as_str()))?;
        info!(
            volume_id = %volume_id,
            delete_on_termination = flag.delete_on_termination,
            "updated delete-on-termination flag"
        );
        Ok(flag)
    }
}
