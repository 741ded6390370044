//! JSON-file implementation of the mapping store.
//!
//! The whole table lives in one JSON document. Every mutation is a
//! read-modify-write cycle serialised by a process-local mutex; running
//! several processes against the same file is not supported.
//!
//! File I/O is synchronous and runs inline on the calling task. The table is
//! small and the CLI serves one request per process; a long-running server
//! should move the cycle onto `tokio::task::spawn_blocking`.

use std::io;
use std::sync::{Mutex, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};

use super::{MappingItem, MappingStore, MappingStoreError, StoreFuture};
use crate::ids::{BackendId, Ec2Id, ResourceKind};

/// Attempts made to draw an unused EC2 ID before giving up.
const MAX_ID_ATTEMPTS: usize = 16;

#[derive(Debug, Default, Deserialize, Serialize)]
struct MappingDocument {
    #[serde(default)]
    items: Vec<MappingItem>,
}

/// Mapping store persisted as a JSON file.
#[derive(Debug)]
pub struct JsonMappingStore {
    path: Utf8PathBuf,
    write_lock: Mutex<()>,
}

impl JsonMappingStore {
    /// Creates a store backed by the given file. The file is created on the
    /// first write.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn load(&self) -> Result<MappingDocument, MappingStoreError> {
        let file_name = self.file_name()?;
        let dir = match Dir::open_ambient_dir(self.parent(), ambient_authority()) {
            Ok(dir) => dir,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(MappingDocument::default());
            }
            Err(err) => return Err(self.io_error(&err)),
        };
        let contents = match dir.read_to_string(file_name) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(MappingDocument::default());
            }
            Err(err) => return Err(self.io_error(&err)),
        };
        if contents.trim().is_empty() {
            return Ok(MappingDocument::default());
        }
        serde_json::from_str(&contents).map_err(|err| MappingStoreError::Corrupt {
            location: self.path.to_string(),
            message: err.to_string(),
        })
    }

    fn save(&self, document: &MappingDocument) -> Result<(), MappingStoreError> {
        let file_name = self.file_name()?;
        Dir::create_ambient_dir_all(self.parent(), ambient_authority())
            .map_err(|err| self.io_error(&err))?;
        let dir = Dir::open_ambient_dir(self.parent(), ambient_authority())
            .map_err(|err| self.io_error(&err))?;
        let rendered =
            serde_json::to_string_pretty(document).map_err(|err| MappingStoreError::Corrupt {
                location: self.path.to_string(),
                message: err.to_string(),
            })?;
        dir.write(file_name, rendered)
            .map_err(|err| self.io_error(&err))
    }

    fn parent(&self) -> &Utf8Path {
        match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        }
    }

    fn file_name(&self) -> Result<&str, MappingStoreError> {
        self.path.file_name().ok_or_else(|| MappingStoreError::Io {
            location: self.path.to_string(),
            message: String::from("mapping file path is missing a filename"),
        })
    }

    fn io_error(&self, err: &io::Error) -> MappingStoreError {
        MappingStoreError::Io {
            location: self.path.to_string(),
            message: err.to_string(),
        }
    }

    fn with_document<T>(
        &self,
        mutate: impl FnOnce(&mut MappingDocument) -> Result<(T, bool), MappingStoreError>,
    ) -> Result<T, MappingStoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut document = self.load()?;
        let (value, dirty) = mutate(&mut document)?;
        if dirty {
            self.save(&document)?;
        }
        Ok(value)
    }
}

fn fresh_id(document: &MappingDocument, kind: ResourceKind) -> Result<Ec2Id, MappingStoreError> {
    (0..MAX_ID_ATTEMPTS)
        .map(|_| kind.generate_id())
        .find(|candidate| document.items.iter().all(|item| &item.ec2_id != candidate))
        .ok_or_else(|| MappingStoreError::Rejected {
            operation: String::from("add_item"),
            message: format!("could not allocate an unused {kind} ID"),
        })
}

impl MappingStore for JsonMappingStore {
    fn get_item<'a>(&'a self, ec2_id: &'a Ec2Id) -> StoreFuture<'a, Option<MappingItem>> {
        Box::pin(async move {
            self.with_document(|document| {
                let found = document
                    .items
                    .iter()
                    .find(|item| &item.ec2_id == ec2_id)
                    .cloned();
                Ok((found, false))
            })
        })
    }

    fn get_item_by_backend_id<'a>(
        &'a self,
        kind: ResourceKind,
        backend_id: &'a BackendId,
    ) -> StoreFuture<'a, Option<MappingItem>> {
        Box::pin(async move {
            self.with_document(|document| {
                let found = document
                    .items
                    .iter()
                    .find(|item| item.kind == kind && &item.backend_id == backend_id)
                    .cloned();
                Ok((found, false))
            })
        })
    }

    fn list_items(&self, kind: ResourceKind) -> StoreFuture<'_, Vec<MappingItem>> {
        Box::pin(async move {
            self.with_document(|document| {
                let items = document
                    .items
                    .iter()
                    .filter(|item| item.kind == kind)
                    .cloned()
                    .collect();
                Ok((items, false))
            })
        })
    }

    fn add_item<'a>(
        &'a self,
        kind: ResourceKind,
        backend_id: &'a BackendId,
    ) -> StoreFuture<'a, MappingItem> {
        Box::pin(async move {
            self.with_document(|document| {
                let item = MappingItem {
                    ec2_id: fresh_id(document, kind)?,
                    backend_id: backend_id.clone(),
                    kind,
                };
                document.items.push(item.clone());
                Ok((item, true))
            })
        })
    }

    fn delete_item<'a>(&'a self, ec2_id: &'a Ec2Id) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.with_document(|document| {
                let before = document.items.len();
                document.items.retain(|item| &item.ec2_id != ec2_id);
                Ok(((), document.items.len() != before))
            })
        })
    }
}
