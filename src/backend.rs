//! Contracts for the block-storage and compute backends the gateway fronts.
//!
//! Backend responses are modelled as immutable value structs. Client
//! implementations decode their wire formats into these types and classify
//! failures into [`BackendError`] so the translation layer never inspects
//! provider-specific payloads.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::ids::BackendId;

/// Volume status as reported by the block-storage service.
///
/// Only the states the gateway reasons about get their own variant; every
/// other status is carried verbatim in [`VolumeStatus::Other`].
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub enum VolumeStatus {
    /// Volume is being allocated.
    Creating,
    /// Volume is ready and unattached.
    Available,
    /// Attachment to a server is in progress.
    Attaching,
    /// Detachment from a server is in progress.
    Detaching,
    /// Volume is attached to a server.
    InUse,
    /// Volume is being removed.
    Deleting,
    /// Backend reported a failure.
    Error,
    /// Any other backend status, passed through untouched.
    Other(String),
}

impl VolumeStatus {
    /// Parses a backend status string.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "creating" => Self::Creating,
            "available" => Self::Available,
            "attaching" => Self::Attaching,
            "detaching" => Self::Detaching,
            "in-use" => Self::InUse,
            "deleting" => Self::Deleting,
            "error" => Self::Error,
            other => Self::Other(other.to_owned()),
        }
    }

    /// Returns the wire representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Creating => "creating",
            Self::Available => "available",
            Self::Attaching => "attaching",
            Self::Detaching => "detaching",
            Self::InUse => "in-use",
            Self::Deleting => "deleting",
            Self::Error => "error",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Whether the status is one of the transitional attachment states.
    #[must_use]
    pub const fn is_transitioning(&self) -> bool {
        matches!(self, Self::Attaching | Self::Detaching)
    }

    /// Whether the volume is attached and settled.
    #[must_use]
    pub const fn is_in_use(&self) -> bool {
        matches!(self, Self::InUse)
    }
}

impl fmt::Display for VolumeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VolumeStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VolumeStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Attachment record attached to a backend volume.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BackendAttachment {
    /// Backend identifier of the server holding the volume.
    pub server_id: Option<BackendId>,
    /// Device path on the server (for example `/dev/vdb`).
    pub device: Option<String>,
}

/// Snapshot of a volume as returned by the block-storage service.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BackendVolume {
    /// Backend volume identifier.
    pub id: BackendId,
    /// Backend status.
    pub status: VolumeStatus,
    /// Size in GiB.
    pub size: u64,
    /// Availability zone the volume lives in.
    pub availability_zone: String,
    /// Creation timestamp as reported by the backend.
    pub created_at: String,
    /// Backend volume type, when one was requested.
    pub volume_type: Option<String>,
    /// Whether the volume is encrypted at rest.
    pub encrypted: bool,
    /// Source snapshot backend identifier.
    pub snapshot_id: Option<BackendId>,
    /// Attachment records; only the first one is ever consulted.
    pub attachments: Vec<BackendAttachment>,
}

impl BackendVolume {
    /// Returns the first attachment record, if any.
    #[must_use]
    pub fn first_attachment(&self) -> Option<&BackendAttachment> {
        self.attachments.first()
    }

    /// Returns the server ID from the first attachment record.
    #[must_use]
    pub fn attached_server(&self) -> Option<&BackendId> {
        self.first_attachment()
            .and_then(|attachment| attachment.server_id.as_ref())
    }
}

/// Parameters for allocating a backend volume.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BackendVolumeRequest {
    /// Requested size in GiB. Optional when restoring from a snapshot.
    pub size: Option<u64>,
    /// Snapshot to restore from.
    pub snapshot_id: Option<BackendId>,
    /// Backend volume type.
    pub volume_type: Option<String>,
    /// Target availability zone.
    pub availability_zone: Option<String>,
}

/// Delete-on-termination flag for a volume attachment.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOnTerminationFlag {
    /// Backend volume identifier.
    pub volume_id: BackendId,
    /// Whether the volume is destroyed together with its server.
    pub delete_on_termination: bool,
}

/// Failures reported by backend clients, classified at the client boundary.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum BackendError {
    /// The addressed backend object does not exist.
    #[error("backend resource not found: {message}")]
    NotFound {
        /// Message returned by the backend.
        message: String,
    },
    /// The request conflicts with the current backend state.
    #[error("backend conflict: {message}")]
    Conflict {
        /// Message returned by the backend.
        message: String,
    },
    /// The backend rejected the request as malformed or not allowed.
    #[error("backend rejected request: {message}")]
    BadRequest {
        /// Message returned by the backend.
        message: String,
    },
    /// Transport failures, unexpected statuses, and undecodable responses.
    #[error("backend unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failure.
        message: String,
    },
}

/// Future returned by backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// Operations consumed from the block-storage service.
pub trait StorageBackend: Send + Sync {
    /// Allocates a new volume.
    fn create_volume<'a>(
        &'a self,
        request: &'a BackendVolumeRequest,
    ) -> BackendFuture<'a, BackendVolume>;

    /// Reads the current state of a volume.
    fn get_volume<'a>(&'a self, id: &'a BackendId) -> BackendFuture<'a, BackendVolume>;

    /// Deletes a volume. Fails with `NotFound` or `BadRequest`.
    fn delete_volume<'a>(&'a self, id: &'a BackendId) -> BackendFuture<'a, ()>;

    /// Lists every volume visible to the caller.
    fn list_volumes(&self) -> BackendFuture<'_, Vec<BackendVolume>>;
}

/// Operations consumed from the compute service.
pub trait ComputeBackend: Send + Sync {
    /// Attaches a volume to a server. Fails with `Conflict` or `BadRequest`.
    fn attach_volume<'a>(
        &'a self,
        server_id: &'a BackendId,
        volume_id: &'a BackendId,
        device: &'a str,
    ) -> BackendFuture<'a, ()>;

    /// Detaches a volume from a server.
    fn detach_volume<'a>(
        &'a self,
        server_id: &'a BackendId,
        volume_id: &'a BackendId,
    ) -> BackendFuture<'a, ()>;

    /// Reads the delete-on-termination flag of a volume attachment.
    fn delete_on_termination<'a>(
        &'a self,
        volume_id: &'a BackendId,
    ) -> BackendFuture<'a, DeleteOnTerminationFlag>;

    /// Updates the delete-on-termination flag of a volume attachment.
    fn set_delete_on_termination<'a>(
        &'a self,
        volume_id: &'a BackendId,
        value: bool,
    ) -> BackendFuture<'a, DeleteOnTerminationFlag>;
}
