//! BDD step definitions for the volume lifecycle.

use ec2_volumes::test_support::{attached_to, backend_volume};
use ec2_volumes::{
    BackendId, CreateVolumeRequest, DescribeVolumesRequest, DetachVolumeRequest, Ec2Id, Filter,
    MappingStoreError, ResourceKind, VolumeStatus,
};
use rstest_bdd_macros::{given, then, when};
use tokio::runtime::Runtime;

use super::test_helpers::{Outcome, VolumeContext};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a gateway over empty backends")]
fn empty_gateway(volume_context: VolumeContext) -> VolumeContext {
    volume_context
}

#[given("an available volume \"{id}\"")]
fn available_volume(volume_context: VolumeContext, id: String) -> VolumeContext {
    volume_context
        .storage
        .insert(backend_volume(&id, "available"));
    volume_context
}

#[given("an in-use volume \"{id}\" on server \"{server}\"")]
fn in_use_volume(volume_context: VolumeContext, id: String, server: String) -> VolumeContext {
    volume_context.storage.insert(attached_to(
        backend_volume(&id, "in-use"),
        &server,
        "/dev/vdb",
    ));
    volume_context
}

#[given("the mapping store rejects writes")]
fn mapping_rejects_writes(volume_context: VolumeContext) -> VolumeContext {
    volume_context
        .store
        .fail_next_add(MappingStoreError::Rejected {
            operation: String::from("add"),
            message: String::from("read-only"),
        });
    volume_context
}

#[when("I create a {size} GiB volume")]
fn create_volume(volume_context: VolumeContext, size: u64) -> Result<VolumeContext, StepError> {
    let runtime = Runtime::new()?;
    let service = volume_context.service();
    let request = CreateVolumeRequest {
        availability_zone: Some(String::from("nova")),
        size: Some(size),
        ..CreateVolumeRequest::default()
    };
    let result = runtime.block_on(async move { service.create_volume(request).await });
    Ok(volume_context.with_outcome(Outcome::from_result(result, Outcome::Created)))
}

#[when("I attach volume \"{volume}\" to instance \"{instance}\" at \"{device}\"")]
fn attach_volume(
    volume_context: VolumeContext,
    volume: String,
    instance: String,
    device: String,
) -> Result<VolumeContext, StepError> {
    let runtime = Runtime::new()?;
    let service = volume_context.service();
    let result = runtime.block_on(async move {
        service
            .attach_volume(&BackendId::new(volume), &Ec2Id::new(instance), &device)
            .await
    });
    Ok(volume_context.with_outcome(Outcome::from_result(result, Outcome::Attached)))
}

#[when("I detach volume \"{volume}\"")]
fn detach_volume(volume_context: VolumeContext, volume: String) -> Result<VolumeContext, StepError> {
    let runtime = Runtime::new()?;
    let service = volume_context.service();
    let request = DetachVolumeRequest::new(volume);
    let result = runtime.block_on(async move { service.detach_volume(&request).await });
    Ok(volume_context.with_outcome(Outcome::from_result(result, Outcome::Attached)))
}

#[when("I delete volume \"{volume}\"")]
fn delete_volume(volume_context: VolumeContext, volume: String) -> Result<VolumeContext, StepError> {
    let runtime = Runtime::new()?;
    let service = volume_context.service();
    let result = runtime
        .block_on(async move { service.delete_volume(&BackendId::new(volume)).await });
    Ok(volume_context.with_outcome(Outcome::from_result(result, |_| Outcome::Deleted)))
}

#[when("I describe volume \"{volume}\"")]
fn describe_volume(
    volume_context: VolumeContext,
    volume: String,
) -> Result<VolumeContext, StepError> {
    let request = DescribeVolumesRequest {
        volume_ids: vec![BackendId::new(volume)],
        filters: Vec::new(),
    };
    describe(volume_context, &request)
}

#[when("I describe volumes with status \"{pattern}\"")]
fn describe_by_status(
    volume_context: VolumeContext,
    pattern: String,
) -> Result<VolumeContext, StepError> {
    let request = DescribeVolumesRequest {
        volume_ids: Vec::new(),
        filters: vec![Filter::new("status", [pattern])],
    };
    describe(volume_context, &request)
}

fn describe(
    volume_context: VolumeContext,
    request: &DescribeVolumesRequest,
) -> Result<VolumeContext, StepError> {
    let runtime = Runtime::new()?;
    let service = volume_context.service();
    let result = runtime.block_on(async move { service.describe_volumes(request).await });
    Ok(volume_context.with_outcome(Outcome::from_result(result, Outcome::Listed)))
}

#[then("the request succeeds")]
fn request_succeeds(volume_context: &VolumeContext) -> Result<(), StepError> {
    match volume_context.outcome {
        Some(Outcome::Failed { ref code, ref message }) => Err(StepError::Assertion(format!(
            "expected success, got {code}: {message}"
        ))),
        Some(_) => Ok(()),
        None => Err(StepError::Assertion(String::from("missing outcome"))),
    }
}

#[then("the error code is \"{code}\"")]
fn error_code(volume_context: &VolumeContext, code: String) -> Result<(), StepError> {
    let Some(Outcome::Failed { code: actual, .. }) = &volume_context.outcome else {
        return Err(StepError::Assertion(String::from(
            "expected failure outcome",
        )));
    };
    if *actual == code {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected error code {code}, got {actual}"
        )))
    }
}

#[then("the volume ID is \"{id}\"")]
fn volume_id_is(volume_context: &VolumeContext, id: String) -> Result<(), StepError> {
    let Some(Outcome::Created(volume)) = &volume_context.outcome else {
        return Err(StepError::Assertion(String::from(
            "expected a created volume",
        )));
    };
    if volume.volume_id.as_str() == id {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected volume {id}, got {}",
            volume.volume_id
        )))
    }
}

#[then("the volume mapping count is {count}")]
fn volume_mapping_count(volume_context: &VolumeContext, count: usize) -> Result<(), StepError> {
    let actual = volume_context.store.items_of(ResourceKind::Volume).len();
    if actual == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} volume mappings, got {actual}"
        )))
    }
}

#[then("the allocated backend volume is deleted again")]
fn allocated_volume_deleted(volume_context: &VolumeContext) -> Result<(), StepError> {
    let deleted = volume_context.storage.deleted();
    let remaining = volume_context.storage.volumes();
    let all_deleting = remaining
        .iter()
        .all(|volume| volume.status == VolumeStatus::Deleting);
    if deleted.len() == 1 && all_deleting {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected the created volume to be rolled back, deleted {deleted:?}, found {remaining:?}"
        )))
    }
}

#[then("the attachment reports instance \"{instance}\" in state \"{state}\"")]
fn attachment_reports(
    volume_context: &VolumeContext,
    instance: String,
    state: String,
) -> Result<(), StepError> {
    let Some(Outcome::Attached(attachment)) = &volume_context.outcome else {
        return Err(StepError::Assertion(String::from(
            "expected an attachment",
        )));
    };
    let instance_matches = attachment
        .instance_id
        .as_ref()
        .is_some_and(|id| id.as_str() == instance);
    if instance_matches && attachment.status.as_str() == state && !attachment.delete_on_termination
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected instance {instance} in state {state}, got {attachment:?}"
        )))
    }
}

#[then("the listing contains only \"{id}\"")]
fn listing_contains_only(volume_context: &VolumeContext, id: String) -> Result<(), StepError> {
    let Some(Outcome::Listed(volumes)) = &volume_context.outcome else {
        return Err(StepError::Assertion(String::from("expected a listing")));
    };
    let ids: Vec<&str> = volumes.iter().map(|volume| volume.volume_id.as_str()).collect();
    if ids == [id.as_str()] {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("expected only {id}, got {ids:?}")))
    }
}
