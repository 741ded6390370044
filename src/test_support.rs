//! In-memory test doubles shared across unit and integration tests.
//!
//! [`FakeStorage`] and [`FakeCompute`] share one volume table, so attaching
//! through the compute double is visible when the storage double is read
//! back, the same way the real services behave.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::backend::{
    BackendAttachment, BackendError, BackendFuture, BackendVolume, BackendVolumeRequest,
    ComputeBackend, DeleteOnTerminationFlag, StorageBackend, VolumeStatus,
};
use crate::ids::{BackendId, Ec2Id, ResourceKind};
use crate::mapping::{MappingItem, MappingStore, MappingStoreError, StoreFuture};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builds a backend volume with sensible defaults for tests.
#[must_use]
pub fn backend_volume(id: &str, status: &str) -> BackendVolume {
    BackendVolume {
        id: BackendId::from(id),
        status: VolumeStatus::parse(status),
        size: 10,
        availability_zone: String::from("nova"),
        created_at: String::from("2024-05-01T10:00:00.000000"),
        volume_type: None,
        encrypted: false,
        snapshot_id: None,
        attachments: Vec::new(),
    }
}

/// Returns a copy of the volume attached to the given server.
#[must_use]
pub fn attached_to(volume: BackendVolume, server_id: &str, device: &str) -> BackendVolume {
    BackendVolume {
        attachments: vec![BackendAttachment {
            server_id: Some(BackendId::from(server_id)),
            device: Some(device.to_owned()),
        }],
        ..volume
    }
}

#[derive(Debug, Default)]
struct StorageState {
    volumes: Vec<BackendVolume>,
    next_id: usize,
    initial_status: Option<VolumeStatus>,
    create_requests: Vec<BackendVolumeRequest>,
    deleted: Vec<BackendId>,
    create_failures: VecDeque<BackendError>,
    delete_failures: VecDeque<BackendError>,
    list_failures: VecDeque<BackendError>,
    post_attach_status: Option<VolumeStatus>,
    attach_failures: VecDeque<BackendError>,
    flag_failures: VecDeque<BackendError>,
    attach_calls: Vec<(BackendId, BackendId, String)>,
    detach_calls: Vec<(BackendId, BackendId)>,
    flags: Vec<DeleteOnTerminationFlag>,
}

/// Block-storage double holding volumes in memory.
///
/// Allocated volumes are named `bv-1`, `bv-2`, ... in creation order.
/// Deleted volumes stay listed as `deleting` until [`FakeStorage::vanish`]
/// removes them.
#[derive(Clone, Debug, Default)]
pub struct FakeStorage {
    state: Arc<Mutex<StorageState>>,
}

impl FakeStorage {
    /// Creates an empty storage double.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a compute double sharing this storage's volume table.
    #[must_use]
    pub fn compute(&self) -> FakeCompute {
        FakeCompute {
            state: Arc::clone(&self.state),
        }
    }

    /// Adds a pre-existing volume.
    pub fn insert(&self, volume: BackendVolume) {
        lock(&self.state).volumes.push(volume);
    }

    /// Sets the status newly allocated volumes start in (default `creating`).
    pub fn set_initial_status(&self, status: &str) {
        lock(&self.state).initial_status = Some(VolumeStatus::parse(status));
    }

    /// Makes the next `create_volume` call fail.
    pub fn fail_next_create(&self, error: BackendError) {
        lock(&self.state).create_failures.push_back(error);
    }

    /// Makes the next `delete_volume` call fail.
    pub fn fail_next_delete(&self, error: BackendError) {
        lock(&self.state).delete_failures.push_back(error);
    }

    /// Makes the next `list_volumes` call fail.
    pub fn fail_next_list(&self, error: BackendError) {
        lock(&self.state).list_failures.push_back(error);
    }

    /// Removes a volume from the listing, as if the backend had finished
    /// deleting it or another client had removed it.
    pub fn vanish(&self, id: &str) {
        lock(&self.state)
            .volumes
            .retain(|volume| volume.id.as_str() != id);
    }

    /// Current volumes, in insertion order.
    #[must_use]
    pub fn volumes(&self) -> Vec<BackendVolume> {
        lock(&self.state).volumes.clone()
    }

    /// Create requests received so far.
    #[must_use]
    pub fn create_requests(&self) -> Vec<BackendVolumeRequest> {
        lock(&self.state).create_requests.clone()
    }

    /// Volume IDs passed to successful `delete_volume` calls.
    #[must_use]
    pub fn deleted(&self) -> Vec<BackendId> {
        lock(&self.state).deleted.clone()
    }
}

impl StorageBackend for FakeStorage {
    fn create_volume<'a>(
        &'a self,
        request: &'a BackendVolumeRequest,
    ) -> BackendFuture<'a, BackendVolume> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            state.create_requests.push(request.clone());
            if let Some(error) = state.create_failures.pop_front() {
                return Err(error);
            }
            state.next_id += 1;
            let mut volume = backend_volume(&format!("bv-{}", state.next_id), "creating");
            if let Some(status) = state.initial_status.clone() {
                volume.status = status;
            }
            volume.size = request.size.unwrap_or(volume.size);
            if let Some(zone) = request.availability_zone.clone() {
                volume.availability_zone = zone;
            }
            volume.volume_type.clone_from(&request.volume_type);
            volume.snapshot_id.clone_from(&request.snapshot_id);
            state.volumes.push(volume.clone());
            Ok(volume)
        })
    }

    fn get_volume<'a>(&'a self, id: &'a BackendId) -> BackendFuture<'a, BackendVolume> {
        Box::pin(async move {
            lock(&self.state)
                .volumes
                .iter()
                .find(|volume| &volume.id == id)
                .cloned()
                .ok_or_else(|| BackendError::NotFound {
                    message: format!("volume {id} could not be found"),
                })
        })
    }

    fn delete_volume<'a>(&'a self, id: &'a BackendId) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if let Some(error) = state.delete_failures.pop_front() {
                return Err(error);
            }
            let volume = find_volume(&mut state, id)?;
            if volume.status == VolumeStatus::Deleting {
                return Err(BackendError::BadRequest {
                    message: format!("volume {id} is already being deleted"),
                });
            }
            volume.status = VolumeStatus::Deleting;
            state.deleted.push(id.clone());
            Ok(())
        })
    }

    fn list_volumes(&self) -> BackendFuture<'_, Vec<BackendVolume>> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if let Some(error) = state.list_failures.pop_front() {
                return Err(error);
            }
            Ok(state.volumes.clone())
        })
    }
}

/// Compute double operating on the volume table of a [`FakeStorage`].
#[derive(Clone, Debug)]
pub struct FakeCompute {
    state: Arc<Mutex<StorageState>>,
}

impl FakeCompute {
    /// Sets the volume status reported right after an attach (default
    /// `attaching`).
    pub fn set_post_attach_status(&self, status: &str) {
        lock(&self.state).post_attach_status = Some(VolumeStatus::parse(status));
    }

    /// Makes the next `attach_volume` call fail.
    pub fn fail_next_attach(&self, error: BackendError) {
        lock(&self.state).attach_failures.push_back(error);
    }

    /// Makes the next flag read or update fail.
    pub fn fail_next_flag(&self, error: BackendError) {
        lock(&self.state).flag_failures.push_back(error);
    }

    /// Attach calls received so far as `(server, volume, device)`.
    #[must_use]
    pub fn attach_calls(&self) -> Vec<(BackendId, BackendId, String)> {
        lock(&self.state).attach_calls.clone()
    }

    /// Detach calls received so far as `(server, volume)`.
    #[must_use]
    pub fn detach_calls(&self) -> Vec<(BackendId, BackendId)> {
        lock(&self.state).detach_calls.clone()
    }
}

fn find_volume<'s>(
    state: &'s mut StorageState,
    id: &BackendId,
) -> Result<&'s mut BackendVolume, BackendError> {
    state
        .volumes
        .iter_mut()
        .find(|volume| &volume.id == id)
        .ok_or_else(|| BackendError::NotFound {
            message: format!("volume {id} could not be found"),
        })
}

impl ComputeBackend for FakeCompute {
    fn attach_volume<'a>(
        &'a self,
        server_id: &'a BackendId,
        volume_id: &'a BackendId,
        device: &'a str,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            state
                .attach_calls
                .push((server_id.clone(), volume_id.clone(), device.to_owned()));
            if let Some(error) = state.attach_failures.pop_front() {
                return Err(error);
            }
            let status = state
                .post_attach_status
                .clone()
                .unwrap_or(VolumeStatus::Attaching);
            let volume = find_volume(&mut state, volume_id)?;
            volume.status = status;
            volume.attachments = vec![BackendAttachment {
                server_id: Some(server_id.clone()),
                device: Some(device.to_owned()),
            }];
            Ok(())
        })
    }

    fn detach_volume<'a>(
        &'a self,
        server_id: &'a BackendId,
        volume_id: &'a BackendId,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            state
                .detach_calls
                .push((server_id.clone(), volume_id.clone()));
            let volume = find_volume(&mut state, volume_id)?;
            volume.status = VolumeStatus::Detaching;
            Ok(())
        })
    }

    fn delete_on_termination<'a>(
        &'a self,
        volume_id: &'a BackendId,
    ) -> BackendFuture<'a, DeleteOnTerminationFlag> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if let Some(error) = state.flag_failures.pop_front() {
                return Err(error);
            }
            let current = state
                .flags
                .iter()
                .find(|flag| &flag.volume_id == volume_id)
                .cloned();
            Ok(current.unwrap_or_else(|| DeleteOnTerminationFlag {
                volume_id: volume_id.clone(),
                delete_on_termination: false,
            }))
        })
    }

    fn set_delete_on_termination<'a>(
        &'a self,
        volume_id: &'a BackendId,
        value: bool,
    ) -> BackendFuture<'a, DeleteOnTerminationFlag> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if let Some(error) = state.flag_failures.pop_front() {
                return Err(error);
            }
            let flag = DeleteOnTerminationFlag {
                volume_id: volume_id.clone(),
                delete_on_termination: value,
            };
            state.flags.retain(|existing| &existing.volume_id != volume_id);
            state.flags.push(flag.clone());
            Ok(flag)
        })
    }
}

#[derive(Debug, Default)]
struct MappingState {
    items: Vec<MappingItem>,
    next_id: u32,
    add_failures: VecDeque<MappingStoreError>,
    delete_failures: VecDeque<MappingStoreError>,
}

/// Mapping store double. Generated IDs are sequential (`vol-00000001`, ...)
/// and skip IDs that are already present.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMappingStore {
    state: Arc<Mutex<MappingState>>,
}

impl InMemoryMappingStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry with a fixed EC2 ID.
    pub fn seed(&self, kind: ResourceKind, ec2_id: &str, backend_id: &str) {
        lock(&self.state).items.push(MappingItem {
            ec2_id: Ec2Id::from(ec2_id),
            backend_id: BackendId::from(backend_id),
            kind,
        });
    }

    /// Makes the next `add_item` call fail.
    pub fn fail_next_add(&self, error: MappingStoreError) {
        lock(&self.state).add_failures.push_back(error);
    }

    /// Makes the next `delete_item` call fail.
    pub fn fail_next_delete(&self, error: MappingStoreError) {
        lock(&self.state).delete_failures.push_back(error);
    }

    /// All entries, in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<MappingItem> {
        lock(&self.state).items.clone()
    }

    /// Entries of one kind, in insertion order.
    #[must_use]
    pub fn items_of(&self, kind: ResourceKind) -> Vec<MappingItem> {
        lock(&self.state)
            .items
            .iter()
            .filter(|item| item.kind == kind)
            .cloned()
            .collect()
    }
}

impl MappingStore for InMemoryMappingStore {
    fn get_item<'a>(&'a self, ec2_id: &'a Ec2Id) -> StoreFuture<'a, Option<MappingItem>> {
        Box::pin(async move {
            Ok(lock(&self.state)
                .items
                .iter()
                .find(|item| &item.ec2_id == ec2_id)
                .cloned())
        })
    }

    fn get_item_by_backend_id<'a>(
        &'a self,
        kind: ResourceKind,
        backend_id: &'a BackendId,
    ) -> StoreFuture<'a, Option<MappingItem>> {
        Box::pin(async move {
            Ok(lock(&self.state)
                .items
                .iter()
                .find(|item| item.kind == kind && &item.backend_id == backend_id)
                .cloned())
        })
    }

    fn list_items(&self, kind: ResourceKind) -> StoreFuture<'_, Vec<MappingItem>> {
        Box::pin(async move { Ok(self.items_of(kind)) })
    }

    fn add_item<'a>(
        &'a self,
        kind: ResourceKind,
        backend_id: &'a BackendId,
    ) -> StoreFuture<'a, MappingItem> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if let Some(error) = state.add_failures.pop_front() {
                return Err(error);
            }
            let ec2_id = loop {
                state.next_id += 1;
                let candidate = Ec2Id::new(format!("{}-{:08x}", kind.prefix(), state.next_id));
                if state.items.iter().all(|item| item.ec2_id != candidate) {
                    break candidate;
                }
            };
            let item = MappingItem {
                ec2_id,
                backend_id: backend_id.clone(),
                kind,
            };
            state.items.push(item.clone());
            Ok(item)
        })
    }

    fn delete_item<'a>(&'a self, ec2_id: &'a Ec2Id) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let mut state = lock(&self.state);
            if let Some(error) = state.delete_failures.pop_front() {
                return Err(error);
            }
            state.items.retain(|item| &item.ec2_id != ec2_id);
            Ok(())
        })
    }
}
