//! Identifier newtypes for the two ID spaces the gateway translates between.
//!
//! EC2 identifiers (`vol-1a2b3c4d`, `i-0000beef`) are what callers see.
//! Backend identifiers are whatever the block-storage or compute service
//! hands out, usually UUIDs. Keeping them as distinct types stops the two
//! from being mixed up in the translation code.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw identifier, trimming surrounding whitespace.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into().trim().to_owned())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub const fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &Self::Target {
                self.as_str()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

newtype!(
    /// Caller-facing identifier in the EC2 ID space.
    Ec2Id
);
newtype!(
    /// Native identifier assigned by a backend service.
    BackendId
);

/// Resource kinds tracked by the ID mapping table.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Block-storage volume.
    Volume,
    /// Block-storage snapshot.
    Snapshot,
    /// Compute instance.
    Instance,
}

impl ResourceKind {
    /// EC2 ID prefix used for this kind.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Volume => "vol",
            Self::Snapshot => "snap",
            Self::Instance => "i",
        }
    }

    /// Infers the kind from an EC2 identifier's prefix.
    #[must_use]
    pub fn of(ec2_id: &Ec2Id) -> Option<Self> {
        let (prefix, _) = ec2_id.split_once('-')?;
        [Self::Volume, Self::Snapshot, Self::Instance]
            .into_iter()
            .find(|kind| kind.prefix() == prefix)
    }

    /// Generates a fresh EC2 identifier of the form `<prefix>-<8 hex digits>`.
    #[must_use]
    pub fn generate_id(self) -> Ec2Id {
        let suffix: String = Uuid::new_v4().simple().to_string().chars().take(8).collect();
        Ec2Id(format!("{}-{suffix}", self.prefix()))
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Volume => "volume",
            Self::Snapshot => "snapshot",
            Self::Instance => "instance",
        })
    }
}
