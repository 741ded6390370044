//! Caller-facing error taxonomy.
//!
//! Backend and mapping-store failures are translated into
//! [`VolumeApiError`] at the operation boundary; callers never see backend
//! vocabulary. Each variant carries the EC2 error code it maps to.

use thiserror::Error;

use crate::backend::BackendError;
use crate::ids::ResourceKind;
use crate::mapping::MappingStoreError;

/// Errors returned by the volume operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum VolumeApiError {
    /// An EC2 ID is unknown, or the backend object it names has gone.
    #[error("the {kind} ID '{id}' does not exist")]
    NotFound {
        /// Kind of the missing resource.
        kind: ResourceKind,
        /// Identifier supplied by the caller.
        id: String,
    },
    /// The operation is invalid for the resource's current state.
    #[error("{reason}")]
    IncorrectState {
        /// Human-readable explanation.
        reason: String,
    },
    /// The backend rejected the request for a reason not further
    /// distinguished.
    #[error("the requested operation is not supported")]
    UnsupportedOperation,
    /// A required request parameter was omitted.
    #[error("the request must contain the parameter {name}")]
    MissingParameter {
        /// Parameter name.
        name: String,
    },
    /// A request parameter holds an unacceptable value.
    #[error("value for parameter {name} is invalid: {reason}")]
    InvalidParameterValue {
        /// Parameter name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// A backend failure outside the translation table.
    #[error("backend request failed: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
    /// The ID mapping store failed.
    #[error("mapping store failure: {message}")]
    MappingStore {
        /// Description of the failure.
        message: String,
    },
}

impl VolumeApiError {
    /// Returns the EC2 error code reported to API callers.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { kind, .. } => match kind {
                ResourceKind::Volume => "InvalidVolume.NotFound",
                ResourceKind::Snapshot => "InvalidSnapshot.NotFound",
                ResourceKind::Instance => "InvalidInstanceID.NotFound",
            },
            Self::IncorrectState { .. } => "IncorrectState",
            Self::UnsupportedOperation => "UnsupportedOperation",
            Self::MissingParameter { .. } => "MissingParameter",
            Self::InvalidParameterValue { .. } => "InvalidParameterValue",
            Self::Backend { .. } | Self::MappingStore { .. } => "InternalError",
        }
    }

    pub(crate) fn not_found(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Translates a backend failure on a known volume. `NotFound` keeps its
    /// meaning; anything else becomes [`VolumeApiError::Backend`].
    pub(crate) fn from_volume_backend(err: BackendError, volume_id: &str) -> Self {
        match err {
            BackendError::NotFound { .. } => Self::not_found(ResourceKind::Volume, volume_id),
            other => other.into(),
        }
    }

    /// Collapses `Conflict` and `BadRequest` into
    /// [`VolumeApiError::UnsupportedOperation`].
    pub(crate) fn from_rejection(err: BackendError) -> Self {
        match err {
            BackendError::Conflict { .. } | BackendError::BadRequest { .. } => {
                Self::UnsupportedOperation
            }
            other => other.into(),
        }
    }

    /// Like [`VolumeApiError::from_rejection`], but a `NotFound` from the
    /// backend names the addressed volume.
    pub(crate) fn from_volume_rejection(err: BackendError, volume_id: &str) -> Self {
        match err {
            BackendError::NotFound { .. } => Self::not_found(ResourceKind::Volume, volume_id),
            other => Self::from_rejection(other),
        }
    }
}

impl From<BackendError> for VolumeApiError {
    fn from(value: BackendError) -> Self {
        Self::Backend {
            message: value.to_string(),
        }
    }
}

impl From<MappingStoreError> for VolumeApiError {
    fn from(value: MappingStoreError) -> Self {
        Self::MappingStore {
            message: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ResourceKind::Volume, "InvalidVolume.NotFound")]
    #[case(ResourceKind::Snapshot, "InvalidSnapshot.NotFound")]
    #[case(ResourceKind::Instance, "InvalidInstanceID.NotFound")]
    fn not_found_codes_follow_resource_kind(#[case] kind: ResourceKind, #[case] code: &str) {
        assert_eq!(VolumeApiError::not_found(kind, "x-1").code(), code);
    }

    #[test]
    fn rejection_collapses_conflict_and_bad_request() {
        let conflict = BackendError::Conflict {
            message: String::from("busy"),
        };
        let bad = BackendError::BadRequest {
            message: String::from("nope"),
        };
        assert_eq!(
            VolumeApiError::from_rejection(conflict),
            VolumeApiError::UnsupportedOperation
        );
        assert_eq!(
            VolumeApiError::from_rejection(bad),
            VolumeApiError::UnsupportedOperation
        );
    }

    #[test]
    fn unavailable_backend_becomes_internal_error() {
        let err = VolumeApiError::from_rejection(BackendError::Unavailable {
            message: String::from("timeout"),
        });
        assert_eq!(err.code(), "InternalError");
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn missing_volume_reports_volume_id() {
        let err = VolumeApiError::from_volume_backend(
            BackendError::NotFound {
                message: String::from("gone"),
            },
            "bv-9",
        );
        assert_eq!(err.to_string(), "the volume ID 'bv-9' does not exist");
    }
}
