//! BDD scenarios for the volume lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{VolumeContext, volume_context};

#[scenario(
    path = "tests/features/volume_lifecycle.feature",
    name = "Create a volume from a size"
)]
fn scenario_create_volume(volume_context: VolumeContext) {
    drop(volume_context);
}

#[scenario(
    path = "tests/features/volume_lifecycle.feature",
    name = "Roll back a create when the mapping store rejects the entry"
)]
fn scenario_create_rollback(volume_context: VolumeContext) {
    drop(volume_context);
}

#[scenario(
    path = "tests/features/volume_lifecycle.feature",
    name = "Attach a volume to a mapped instance"
)]
fn scenario_attach_volume(volume_context: VolumeContext) {
    drop(volume_context);
}

#[scenario(
    path = "tests/features/volume_lifecycle.feature",
    name = "Reject attaching to an unknown instance"
)]
fn scenario_attach_unknown_instance(volume_context: VolumeContext) {
    drop(volume_context);
}

#[scenario(
    path = "tests/features/volume_lifecycle.feature",
    name = "Reject detaching a volume that is not attached"
)]
fn scenario_detach_unattached(volume_context: VolumeContext) {
    drop(volume_context);
}

#[scenario(
    path = "tests/features/volume_lifecycle.feature",
    name = "Treat deleting a missing volume as success"
)]
fn scenario_delete_missing(volume_context: VolumeContext) {
    drop(volume_context);
}

#[scenario(
    path = "tests/features/volume_lifecycle.feature",
    name = "Describe an unknown volume"
)]
fn scenario_describe_unknown(volume_context: VolumeContext) {
    drop(volume_context);
}

#[scenario(
    path = "tests/features/volume_lifecycle.feature",
    name = "Filter the volume listing by status"
)]
fn scenario_describe_filtered(volume_context: VolumeContext) {
    drop(volume_context);
}
