//! Bulk volume listing with EC2 filters.
//!
//! One describe call lists every backend volume, loads the instance and
//! snapshot mapping tables once, projects each volume, and then applies the
//! ID restriction and filters. Pagination is left to the caller.

use std::collections::HashSet;

use tracing::debug;

use crate::backend::{BackendVolume, ComputeBackend, StorageBackend};
use crate::error::VolumeApiError;
use crate::ids::{BackendId, ResourceKind};
use crate::lifecycle::VolumeService;
use crate::mapping::{CrossReference, MappingStore};
use crate::projection::{self, Volume, VolumeRefs};

/// Parameters accepted by [`VolumeService::describe_volumes`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DescribeVolumesRequest {
    /// Restricts the result to these volumes. Empty means all.
    pub volume_ids: Vec<BackendId>,
    /// Filters that every returned volume must satisfy.
    pub filters: Vec<Filter>,
}

/// One EC2 filter: a volume matches when any value matches the attribute.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Filter {
    /// Attribute name, for example `attachment.instance-id`.
    pub name: String,
    /// Accepted values; `*` and `?` act as wildcards.
    pub values: Vec<String>,
}

impl Filter {
    /// Creates a filter.
    #[must_use]
    pub fn new<I, V>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Volume attributes that can be filtered on.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterAttribute {
    /// `availability-zone`
    AvailabilityZone,
    /// `create-time`
    CreateTime,
    /// `encrypted`
    Encrypted,
    /// `size`
    Size,
    /// `snapshot-id`
    SnapshotId,
    /// `status`
    Status,
    /// `volume-id`
    VolumeId,
    /// `volume-type`
    VolumeType,
    /// `attachment.device`
    AttachmentDevice,
    /// `attachment.instance-id`
    AttachmentInstanceId,
    /// `attachment.status`
    AttachmentStatus,
}

impl FilterAttribute {
    /// Looks up a filter attribute by its EC2 name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let attribute = match name {
            "availability-zone" => Self::AvailabilityZone,
            "create-time" => Self::CreateTime,
            "encrypted" => Self::Encrypted,
            "size" => Self::Size,
            "snapshot-id" => Self::SnapshotId,
            "status" => Self::Status,
            "volume-id" => Self::VolumeId,
            "volume-type" => Self::VolumeType,
            "attachment.device" => Self::AttachmentDevice,
            "attachment.instance-id" => Self::AttachmentInstanceId,
            "attachment.status" => Self::AttachmentStatus,
            _ => return None,
        };
        Some(attribute)
    }

    /// Values of this attribute on a projected volume. Attachment
    /// attributes yield one value per attachment.
    #[must_use]
    pub fn values(self, volume: &Volume) -> Vec<String> {
        let attachments = volume.attachment_set.iter();
        match self {
            Self::AvailabilityZone => vec![volume.availability_zone.clone()],
            Self::CreateTime => vec![volume.create_time.clone()],
            Self::Encrypted => vec![volume.encrypted.to_string()],
            Self::Size => vec![volume.size.to_string()],
            Self::SnapshotId => volume
                .snapshot_id
                .iter()
                .map(ToString::to_string)
                .collect(),
            Self::Status => vec![volume.status.as_str().to_owned()],
            Self::VolumeId => vec![volume.volume_id.to_string()],
            Self::VolumeType => volume.volume_type.iter().cloned().collect(),
            Self::AttachmentDevice => attachments
                .filter_map(|attachment| attachment.device.clone())
                .collect(),
            Self::AttachmentInstanceId => attachments
                .filter_map(|attachment| attachment.instance_id.as_ref())
                .map(ToString::to_string)
                .collect(),
            Self::AttachmentStatus => attachments
                .map(|attachment| attachment.status.as_str().to_owned())
                .collect(),
        }
    }
}

#[derive(Debug)]
struct CompiledFilter<'a> {
    attribute: FilterAttribute,
    patterns: &'a [String],
}

impl CompiledFilter<'_> {
    fn matches(&self, volume: &Volume) -> bool {
        let values = self.attribute.values(volume);
        self.patterns.iter().any(|pattern| {
            values
                .iter()
                .any(|value| wildcard_match(pattern, value))
        })
    }
}

fn compile(filters: &[Filter]) -> Result<Vec<CompiledFilter<'_>>, VolumeApiError> {
    filters
        .iter()
        .map(|filter| {
            let attribute = FilterAttribute::from_name(&filter.name).ok_or_else(|| {
                VolumeApiError::InvalidParameterValue {
                    name: String::from("Filter.Name"),
                    reason: format!("the filter '{}' is invalid", filter.name),
                }
            })?;
            if filter.values.is_empty() {
                return Err(VolumeApiError::InvalidParameterValue {
                    name: String::from("Filter.Value"),
                    reason: format!("the filter '{}' requires at least one value", filter.name),
                });
            }
            Ok(CompiledFilter {
                attribute,
                patterns: &filter.values,
            })
        })
        .collect()
}

/// Matches `value` against an EC2 filter pattern where `*` matches any run
/// of characters and `?` matches exactly one.
#[must_use]
pub fn wildcard_match(pattern: &str, value: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let value_chars: Vec<char> = value.chars().collect();
    let mut pos = 0;
    let mut cursor = 0;
    let mut backtrack: Option<(usize, usize)> = None;

    while cursor < value_chars.len() {
        match (pattern_chars.get(pos), value_chars.get(cursor)) {
            (Some(&'*'), _) => {
                backtrack = Some((pos, cursor));
                pos += 1;
            }
            (Some(&expected), Some(&actual)) if expected == '?' || expected == actual => {
                pos += 1;
                cursor += 1;
            }
            _ => match backtrack {
                Some((star, resume)) => {
                    pos = star + 1;
                    cursor = resume + 1;
                    backtrack = Some((star, resume + 1));
                }
                None => return false,
            },
        }
    }
    pattern_chars
        .get(pos..)
        .is_some_and(|rest| rest.iter().all(|ch| *ch == '*'))
}

impl<S, C, M> VolumeService<S, C, M>
where
    S: StorageBackend,
    C: ComputeBackend,
    M: MappingStore,
{
    /// Lists volumes in EC2 form.
    ///
    /// Two concurrent calls during an in-flight attach may observe
    /// different attachment states for the same volume.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeApiError::InvalidParameterValue`] for unknown filter
    /// names, [`VolumeApiError::NotFound`] naming the first requested
    /// volume ID the backend does not list, and [`VolumeApiError::Backend`]
    /// or [`VolumeApiError::MappingStore`] when a collaborator fails.
    pub async fn describe_volumes(
        &self,
        request: &DescribeVolumesRequest,
    ) -> Result<Vec<Volume>, VolumeApiError> {
        let filters = compile(&request.filters)?;
        let listed = self.storage.list_volumes().await?;
        let selected = restrict(listed, &request.volume_ids)?;

        let instances = self.mapping.cross_reference(ResourceKind::Instance).await?;
        let snapshots = self.mapping.cross_reference(ResourceKind::Snapshot).await?;

        let mut volumes = Vec::with_capacity(selected.len());
        for backend in &selected {
            let projected = self.project_listed(backend, &instances, &snapshots).await?;
            if filters.iter().all(|filter| filter.matches(&projected)) {
                volumes.push(projected);
            }
        }
        debug!(
            listed = selected.len(),
            returned = volumes.len(),
            filters = filters.len(),
            "described volumes"
        );
        Ok(volumes)
    }

    async fn project_listed(
        &self,
        backend: &BackendVolume,
        instances: &CrossReference,
        snapshots: &CrossReference,
    ) -> Result<Volume, VolumeApiError> {
        let snapshot_id = match backend.snapshot_id.as_ref() {
            Some(backend_id) => Some(
                self.mapping
                    .resolve_by_backend_id(ResourceKind::Snapshot, backend_id, Some(snapshots))
                    .await?
                    .ec2_id,
            ),
            None => None,
        };
        let instance_id = match backend.attached_server() {
            Some(server_id) if projection::volume_status(&backend.status).is_in_use() => Some(
                self.mapping
                    .resolve_by_backend_id(ResourceKind::Instance, server_id, Some(instances))
                    .await?
                    .ec2_id,
            ),
            _ => None,
        };
        Ok(projection::volume(
            backend,
            VolumeRefs {
                instance_id,
                snapshot_id,
            },
        ))
    }
}

fn restrict(
    listed: Vec<BackendVolume>,
    volume_ids: &[BackendId],
) -> Result<Vec<BackendVolume>, VolumeApiError> {
    if volume_ids.is_empty() {
        return Ok(listed);
    }
    let known: HashSet<&BackendId> = listed.iter().map(|volume| &volume.id).collect();
    if let Some(missing) = volume_ids.iter().find(|id| !known.contains(id)) {
        return Err(VolumeApiError::not_found(
            ResourceKind::Volume,
            missing.as_str(),
        ));
    }
    let wanted: HashSet<&BackendId> = volume_ids.iter().collect();
    Ok(listed
        .into_iter()
        .filter(|volume| wanted.contains(&volume.id))
        .collect())
}
