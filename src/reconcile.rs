//! Out-of-band reconciliation of the volume mapping table.
//!
//! Deleting a volume never touches its mapping entry, because the backend
//! may still be tearing the volume down. The reconciler closes that gap: a
//! sweep drops entries whose backend volume is no longer listed and adopts
//! backend volumes that were created outside the gateway.
//!
//! Run a sweep while no create is in flight. Mapping entries are read before
//! the volume listing, so a create that overlaps the sweep is at worst
//! adopted a second time and never loses its entry.

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use crate::backend::StorageBackend;
use crate::error::VolumeApiError;
use crate::ids::{BackendId, Ec2Id, ResourceKind};
use crate::mapping::{MappingGateway, MappingItem, MappingStore};

/// Outcome of a reconciliation sweep.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    /// EC2 IDs whose mapping entries were removed.
    pub removed: Vec<Ec2Id>,
    /// Mapping entries created for previously unmapped volumes.
    pub adopted: Vec<MappingItem>,
}

/// Aligns the volume mapping table with the backend's volume listing.
#[derive(Debug)]
pub struct MappingReconciler<'a, S, M> {
    storage: &'a S,
    mapping: &'a MappingGateway<M>,
}

impl<'a, S, M> MappingReconciler<'a, S, M>
where
    S: StorageBackend,
    M: MappingStore,
{
    /// Creates a reconciler over the given collaborators.
    #[must_use]
    pub const fn new(storage: &'a S, mapping: &'a MappingGateway<M>) -> Self {
        Self { storage, mapping }
    }

    /// Runs one sweep.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::Backend`] when the volume listing fails and
    /// [`VolumeApiError::MappingStore`] when the store fails; a failed
    /// removal aborts the sweep.
    pub async fn sweep(&self) -> Result<ReconcileSummary, VolumeApiError> {
        let entries = self.mapping.list(ResourceKind::Volume).await?;
        let volumes = self.storage.list_volumes().await?;

        let listed: HashSet<&BackendId> = volumes.iter().map(|volume| &volume.id).collect();
        let mapped: HashSet<&BackendId> = entries.iter().map(|item| &item.backend_id).collect();

        let mut summary = ReconcileSummary::default();
        for stale in entries.iter().filter(|item| !listed.contains(&item.backend_id)) {
            self.mapping.remove(&stale.ec2_id).await?;
            summary.removed.push(stale.ec2_id.clone());
        }
        for volume in volumes.iter().filter(|volume| !mapped.contains(&volume.id)) {
            summary
                .adopted
                .push(self.mapping.add(ResourceKind::Volume, &volume.id).await?);
        }

        info!(
            listed = volumes.len(),
            removed = summary.removed.len(),
            adopted = summary.adopted.len(),
            "reconciled volume mappings"
        );
        Ok(summary)
    }
}
