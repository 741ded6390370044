//! Shared fixtures for volume lifecycle BDD scenarios.

use ec2_volumes::test_support::{FakeCompute, FakeStorage, InMemoryMappingStore};
use ec2_volumes::{Attachment, ResourceKind, Volume, VolumeApiError, VolumeService};
use rstest::fixture;
use thiserror::Error;

pub type TestService = VolumeService<FakeStorage, FakeCompute, InMemoryMappingStore>;

#[derive(Clone, Debug)]
pub struct VolumeContext {
    pub storage: FakeStorage,
    pub compute: FakeCompute,
    pub store: InMemoryMappingStore,
    pub outcome: Option<Outcome>,
}

impl VolumeContext {
    pub fn service(&self) -> TestService {
        VolumeService::new(
            self.storage.clone(),
            self.compute.clone(),
            self.store.clone(),
        )
    }

    pub fn with_outcome(self, outcome: Outcome) -> Self {
        Self {
            outcome: Some(outcome),
            ..self
        }
    }
}

#[derive(Clone, Debug)]
pub enum Outcome {
    Created(Volume),
    Attached(Attachment),
    Deleted,
    Listed(Vec<Volume>),
    Failed { code: String, message: String },
}

impl Outcome {
    pub fn from_result<T>(result: Result<T, VolumeApiError>, wrap: impl FnOnce(T) -> Self) -> Self {
        match result {
            Ok(value) => wrap(value),
            Err(err) => Self::Failed {
                code: err.code().to_owned(),
                message: err.to_string(),
            },
        }
    }
}

#[derive(Clone, Debug, Error)]
pub enum VolumeTestError {
    #[error("invalid volume fixture: {0}")]
    Fixture(String),
}

pub type VolumeContextResult = Result<VolumeContext, VolumeTestError>;

#[fixture]
pub fn volume_context_result() -> VolumeContextResult {
    build_volume_context()
}

#[fixture]
pub fn volume_context(volume_context_result: VolumeContextResult) -> VolumeContext {
    volume_context_result
        .unwrap_or_else(|err| panic!("volume context fixture should initialise: {err}"))
}

fn build_volume_context() -> VolumeContextResult {
    let storage = FakeStorage::new();
    let compute = storage.compute();
    let store = InMemoryMappingStore::new();
    store.seed(ResourceKind::Instance, "i-1", "bi-1");
    if store.items_of(ResourceKind::Instance).len() != 1 {
        return Err(VolumeTestError::Fixture(String::from(
            "instance mapping was not seeded",
        )));
    }

    Ok(VolumeContext {
        storage,
        compute,
        store,
        outcome: None,
    })
}
