//! Core library for the `ec2-volumes` gateway.
//!
//! The crate translates EC2 volume verbs (create, attach, detach, delete,
//! describe, and the delete-on-termination flag) into calls against an
//! OpenStack-style block-storage service and compute service. Callers see
//! EC2 identifiers and EC2 states; the [`mapping`] module keeps the table
//! that ties EC2 IDs to backend IDs, and [`projection`] derives the EC2
//! view from backend snapshots.

pub mod backend;
pub mod compensation;
pub mod config;
pub mod describe;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod mapping;
pub mod openstack;
pub mod projection;
pub mod reconcile;
pub mod test_support;

pub use backend::{
    BackendAttachment, BackendError, BackendVolume, BackendVolumeRequest, ComputeBackend,
    DeleteOnTerminationFlag, StorageBackend, VolumeStatus,
};
pub use compensation::CompensationScope;
pub use config::{ConfigError, GatewayConfig};
pub use describe::{DescribeVolumesRequest, Filter, FilterAttribute};
pub use error::VolumeApiError;
pub use ids::{BackendId, Ec2Id, ResourceKind};
pub use lifecycle::{CreateVolumeRequest, DetachVolumeRequest, VolumeService};
pub use mapping::{
    CrossReference, JsonMappingStore, MappingGateway, MappingItem, MappingStore,
    MappingStoreError,
};
pub use openstack::{CinderClient, NovaClient, OpenStackSession};
pub use projection::{Attachment, AttachmentStatus, Volume};
pub use reconcile::{MappingReconciler, ReconcileSummary};
