//! Volume deletion.

use tracing::{debug, info};

use crate::backend::{BackendError, ComputeBackend, StorageBackend};
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
    /// Deletes a backend volume. A volume that is already gone counts as
    /// deleted.
    ///
    /// The volume's mapping entry is left in place; the reconciler removes
    /// it once the backend no longer lists the volume.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::UnsupportedOperation`] when the backend
    /// refuses the deletion, for example because the volume is attached.
    pub async fn delete_volume(&self, volume_id: &BackendId) -> Result<bool, VolumeApiError> {
        match self.storage.delete_volume(volume_id).await {
            Ok(()) => info!(volume_id = %volume_id, "deleted volume"),
            Err(BackendError::NotFound { .. }) => {
                debug!(volume_id = %volume_id, "volume already absent; treating delete as done");
            }
            Err(BackendError::BadRequest { .. }) => {
                return Err(VolumeApiError::UnsupportedOperation);
            }
            Err(other) => return Err(other.into()),
        }
        Ok(true)
    }
}
