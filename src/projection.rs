//! Projection of backend volume snapshots into the EC2 resource model.
//!
//! Everything here is pure. Callers resolve the embedded EC2 IDs (instance
//! and snapshot) beforehand and pass them in through [`VolumeRefs`].

use std::fmt;

use serde::Serialize;

use crate::backend::{BackendVolume, VolumeStatus};
use crate::ids::{BackendId, Ec2Id};

/// Attachment state as reported to EC2 callers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentStatus {
    /// Attachment in progress.
    Attaching,
    /// Volume is attached.
    Attached,
    /// Detachment in progress.
    Detaching,
    /// Volume is not attached.
    Detached,
}

impl AttachmentStatus {
    /// Wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Attaching => "attaching",
            Self::Attached => "attached",
            Self::Detaching => "detaching",
            Self::Detached => "detached",
        }
    }
}

impl fmt::Display for AttachmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// EC2 view of a volume attachment.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    /// Device path on the instance.
    pub device: Option<String>,
    /// EC2 ID of the instance, when known.
    pub instance_id: Option<Ec2Id>,
    /// Attachment state.
    pub status: AttachmentStatus,
    /// Backend volume ID, passed through as the backend reports it.
    pub volume_id: BackendId,
    /// Caller-supplied delete-on-termination flag.
    pub delete_on_termination: bool,
}

/// EC2 view of a volume.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// Volume identifier.
    pub volume_id: BackendId,
    /// Projected volume status.
    pub status: VolumeStatus,
    /// Size in GiB.
    pub size: u64,
    /// Availability zone.
    pub availability_zone: String,
    /// Creation timestamp.
    pub create_time: String,
    /// Volume type.
    pub volume_type: Option<String>,
    /// Whether the volume is encrypted.
    pub encrypted: bool,
    /// EC2 ID of the source snapshot.
    pub snapshot_id: Option<Ec2Id>,
    /// Zero or one attachment.
    pub attachment_set: Vec<Attachment>,
}

/// EC2 IDs embedded in a projected volume.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VolumeRefs {
    /// EC2 ID of the instance holding the volume.
    pub instance_id: Option<Ec2Id>,
    /// EC2 ID of the source snapshot.
    pub snapshot_id: Option<Ec2Id>,
}

/// Collapses the transitional attachment states into `in-use`; every other
/// status passes through verbatim.
#[must_use]
pub fn volume_status(status: &VolumeStatus) -> VolumeStatus {
    if status.is_transitioning() {
        VolumeStatus::InUse
    } else {
        status.clone()
    }
}

/// Derives the attachment status of a backend volume.
#[must_use]
pub fn attachment_status(volume: &BackendVolume) -> AttachmentStatus {
    match volume.status {
        VolumeStatus::Attaching => AttachmentStatus::Attaching,
        VolumeStatus::Detaching => AttachmentStatus::Detaching,
        _ if volume.first_attachment().is_some() => AttachmentStatus::Attached,
        _ => AttachmentStatus::Detached,
    }
}

/// Builds the EC2 attachment view from the first backend attachment record.
#[must_use]
pub fn attachment(
    volume: &BackendVolume,
    instance_id: Option<Ec2Id>,
    delete_on_termination: bool,
) -> Attachment {
    Attachment {
        device: volume
            .first_attachment()
            .and_then(|record| record.device.clone()),
        instance_id,
        status: attachment_status(volume),
        volume_id: volume.id.clone(),
        delete_on_termination,
    }
}

/// Builds the EC2 volume view.
///
/// The attachment set is populated only when the projected status is
/// `in-use`, regardless of what attachment records the backend returned.
#[must_use]
pub fn volume(backend: &BackendVolume, refs: VolumeRefs) -> Volume {
    let status = volume_status(&backend.status);
    let attachment_set = if status.is_in_use() {
        vec![attachment(backend, refs.instance_id, false)]
    } else {
        Vec::new()
    };
    Volume {
        volume_id: backend.id.clone(),
        status,
        size: backend.size,
        availability_zone: backend.availability_zone.clone(),
        create_time: backend.created_at.clone(),
        volume_type: backend.volume_type.clone(),
        encrypted: backend.encrypted,
        snapshot_id: refs.snapshot_id,
        attachment_set,
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::backend::BackendAttachment;

    #[fixture]
    fn attached() -> BackendVolume {
        BackendVolume {
            id: BackendId::from("bv-1"),
            status: VolumeStatus::InUse,
            size: 10,
            availability_zone: String::from("nova"),
            created_at: String::from("2024-05-01T10:00:00.000000"),
            volume_type: Some(String::from("ssd")),
            encrypted: false,
            snapshot_id: None,
            attachments: vec![BackendAttachment {
                server_id: Some(BackendId::from("bi-1")),
                device: Some(String::from("/dev/vdb")),
            }],
        }
    }

    fn with_status(volume: BackendVolume, status: &str) -> BackendVolume {
        BackendVolume {
            status: VolumeStatus::parse(status),
            ..volume
        }
    }

    #[rstest]
    #[case("attaching", "in-use")]
    #[case("detaching", "in-use")]
    #[case("in-use", "in-use")]
    #[case("available", "available")]
    #[case("creating", "creating")]
    #[case("error_restoring", "error_restoring")]
    fn volume_status_collapses_only_transitions(#[case] backend: &str, #[case] expected: &str) {
        assert_eq!(volume_status(&VolumeStatus::parse(backend)).as_str(), expected);
    }

    #[rstest]
    #[case("attaching", AttachmentStatus::Attaching)]
    #[case("detaching", AttachmentStatus::Detaching)]
    #[case("in-use", AttachmentStatus::Attached)]
    #[case("available", AttachmentStatus::Attached)]
    fn attachment_status_with_record(
        attached: BackendVolume,
        #[case] backend: &str,
        #[case] expected: AttachmentStatus,
    ) {
        assert_eq!(attachment_status(&with_status(attached, backend)), expected);
    }

    #[rstest]
    fn attachment_status_without_record_is_detached(attached: BackendVolume) {
        let bare = BackendVolume {
            attachments: Vec::new(),
            ..with_status(attached, "in-use")
        };
        assert_eq!(attachment_status(&bare), AttachmentStatus::Detached);
    }

    #[rstest]
    #[case("available")]
    #[case("creating")]
    #[case("error")]
    #[case("deleting")]
    fn attachment_set_is_empty_unless_in_use(attached: BackendVolume, #[case] backend: &str) {
        let projected = volume(&with_status(attached, backend), VolumeRefs::default());
        assert!(projected.attachment_set.is_empty());
    }

    #[rstest]
    fn in_use_volume_embeds_one_attachment(attached: BackendVolume) {
        let refs = VolumeRefs {
            instance_id: Some(Ec2Id::from("i-00000001")),
            snapshot_id: Some(Ec2Id::from("snap-00000001")),
        };
        let projected = volume(&with_status(attached, "attaching"), refs);

        assert_eq!(projected.status, VolumeStatus::InUse);
        assert_eq!(projected.snapshot_id, Some(Ec2Id::from("snap-00000001")));
        assert_eq!(
            projected.attachment_set,
            vec![Attachment {
                device: Some(String::from("/dev/vdb")),
                instance_id: Some(Ec2Id::from("i-00000001")),
                status: AttachmentStatus::Attaching,
                volume_id: BackendId::from("bv-1"),
                delete_on_termination: false,
            }]
        );
    }

    #[rstest]
    fn volume_serialises_with_ec2_field_names(attached: BackendVolume) {
        let projected = volume(&attached, VolumeRefs::default());
        let json = serde_json::to_value(&projected).expect("serialise");
        assert_eq!(json["volumeId"], "bv-1");
        assert_eq!(json["status"], "in-use");
        assert_eq!(json["availabilityZone"], "nova");
        assert_eq!(json["attachmentSet"][0]["status"], "attached");
        assert_eq!(json["attachmentSet"][0]["deleteOnTermination"], false);
    }
}
