//! Command-line interface definitions for the `ec2-volumes` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{ArgAction, Parser};

/// Top-level CLI for the `ec2-volumes` binary.
#[derive(Debug, Parser)]
#[command(
    name = "ec2-volumes",
    about = "EC2-compatible volume operations against OpenStack block storage and compute",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Create a volume, optionally from a snapshot.
    #[command(name = "create-volume")]
    CreateVolume(CreateVolumeCommand),
    /// Attach a volume to an instance.
    #[command(name = "attach-volume")]
    AttachVolume(AttachVolumeCommand),
    /// Detach a volume from the instance it is attached to.
    #[command(name = "detach-volume")]
    DetachVolume(DetachVolumeCommand),
    /// Delete a volume.
    #[command(name = "delete-volume")]
    DeleteVolume(VolumeIdArgs),
    /// List volumes, optionally restricted by ID and filters.
    #[command(name = "describe-volumes")]
    DescribeVolumes(DescribeVolumesCommand),
    /// Show the delete-on-termination flag of a volume.
    #[command(name = "show-delete-on-termination")]
    ShowDeleteOnTermination(VolumeIdArgs),
    /// Update the delete-on-termination flag of a volume.
    #[command(name = "update-delete-on-termination")]
    UpdateDeleteOnTermination(UpdateDeleteOnTerminationCommand),
    /// Align the volume ID mapping table with the backend listing.
    #[command(name = "reconcile")]
    Reconcile,
}

/// Arguments for `create-volume`.
#[derive(Debug, Parser)]
pub(crate) struct CreateVolumeCommand {
    /// Availability zone for the new volume.
    #[arg(long, value_name = "ZONE")]
    pub(crate) availability_zone: Option<String>,
    /// Size in GiB. Required unless a snapshot is given.
    #[arg(long, value_name = "GIB")]
    pub(crate) size: Option<u64>,
    /// EC2 ID of the snapshot to restore from.
    #[arg(long, value_name = "SNAPSHOT_ID")]
    pub(crate) snapshot_id: Option<String>,
    /// Backend volume type.
    #[arg(long, value_name = "TYPE")]
    pub(crate) volume_type: Option<String>,
    /// Provisioned IOPS (accepted, not applied).
    #[arg(long, value_name = "IOPS")]
    pub(crate) iops: Option<u32>,
    /// Request encryption (accepted, not applied).
    #[arg(long)]
    pub(crate) encrypted: bool,
    /// KMS key identifier (accepted, not applied).
    #[arg(long, value_name = "KEY_ID")]
    pub(crate) kms_key_id: Option<String>,
}

/// Arguments for `attach-volume`.
#[derive(Debug, Parser)]
pub(crate) struct AttachVolumeCommand {
    /// Volume to attach.
    #[arg(long, value_name = "VOLUME_ID")]
    pub(crate) volume_id: String,
    /// EC2 ID of the target instance.
    #[arg(long, value_name = "INSTANCE_ID")]
    pub(crate) instance_id: String,
    /// Device name on the instance (for example `/dev/sdf`).
    #[arg(long, value_name = "DEVICE")]
    pub(crate) device: String,
}

/// Arguments for `detach-volume`.
#[derive(Debug, Parser)]
pub(crate) struct DetachVolumeCommand {
    /// Volume to detach.
    #[arg(long, value_name = "VOLUME_ID")]
    pub(crate) volume_id: String,
    /// Instance the volume is expected on (informational).
    #[arg(long, value_name = "INSTANCE_ID")]
    pub(crate) instance_id: Option<String>,
    /// Device the volume is expected on (informational).
    #[arg(long, value_name = "DEVICE")]
    pub(crate) device: Option<String>,
    /// Force the detachment (informational).
    #[arg(long)]
    pub(crate) force: bool,
}

/// Arguments naming a single volume.
#[derive(Debug, Parser)]
pub(crate) struct VolumeIdArgs {
    /// Volume identifier.
    #[arg(long, value_name = "VOLUME_ID")]
    pub(crate) volume_id: String,
}

/// Arguments for `describe-volumes`.
#[derive(Debug, Parser)]
pub(crate) struct DescribeVolumesCommand {
    /// Restrict the listing to this volume; repeatable.
    #[arg(long = "volume-id", value_name = "VOLUME_ID")]
    pub(crate) volume_ids: Vec<String>,
    /// Filter as `name=value[,value...]`; repeatable. Values accept `*` and
    /// `?` wildcards.
    #[arg(long = "filter", value_name = "NAME=VALUES")]
    pub(crate) filters: Vec<String>,
}

/// Arguments for `update-delete-on-termination`.
#[derive(Debug, Parser)]
pub(crate) struct UpdateDeleteOnTerminationCommand {
    /// Volume identifier.
    #[arg(long, value_name = "VOLUME_ID")]
    pub(crate) volume_id: String,
    /// New flag value.
    #[arg(long, value_name = "BOOL", action = ArgAction::Set)]
    pub(crate) delete_on_termination: bool,
}
