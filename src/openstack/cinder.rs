//! Block-storage (Cinder v3) client.

use std::collections::HashSet;
use std::future::Future;

use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::backend::{
    BackendAttachment, BackendError, BackendFuture, BackendVolume, BackendVolumeRequest, StorageBackend,
    VolumeStatus,
};
use crate::ids::BackendId;

use super::{OpenStackSession, join};

#[derive(Debug, Deserialize)]
struct VolumeEnvelope {
    volume: WireVolume,
}

#[derive(Debug, Deserialize)]
struct VolumeListEnvelope {
    #[serde(default)]
    volumes: Vec<WireVolume>,
    #[serde(default)]
    volumes_links: Vec<WireLink>,
}

impl VolumeListEnvelope {
    fn next_page(&self) -> Option<&str> {
        self.volumes_links
            .iter()
            .find(|link| link.rel == "next")
            .map(|link| link.href.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct WireLink {
    href: String,
    #[serde(default)]
    rel: String,
}

#[derive(Debug, Deserialize)]
struct WireVolume {
    id: String,
    status: String,
    size: u64,
    #[serde(default)]
    availability_zone: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    volume_type: Option<String>,
    #[serde(default)]
    encrypted: bool,
    #[serde(default)]
    snapshot_id: Option<String>,
    #[serde(default)]
    attachments: Vec<WireAttachment>,
}

#[derive(Debug, Deserialize)]
struct WireAttachment {
    #[serde(default)]
    server_id: Option<String>,
    #[serde(default)]
    device: Option<String>,
}

impl From<WireVolume> for BackendVolume {
    fn from(wire: WireVolume) -> Self {
        Self {
            id: BackendId::new(wire.id),
            status: VolumeStatus::parse(&wire.status),
            size: wire.size,
            availability_zone: wire.availability_zone.unwrap_or_default(),
            created_at: wire.created_at.unwrap_or_default(),
            volume_type: wire.volume_type.filter(|value| !value.is_empty()),
            encrypted: wire.encrypted,
            snapshot_id: wire
                .snapshot_id
                .filter(|value| !value.is_empty())
                .map(BackendId::new),
            attachments: wire
                .attachments
                .into_iter()
                .map(|attachment| BackendAttachment {
                    server_id: attachment.server_id.map(BackendId::new),
                    device: attachment.device,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateVolumeBody<'a> {
    volume: CreateVolumePayload<'a>,
}

#[derive(Debug, Serialize)]
struct CreateVolumePayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshot_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    volume_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    availability_zone: Option<&'a str>,
}

impl<'a> From<&'a BackendVolumeRequest> for CreateVolumeBody<'a> {
    fn from(request: &'a BackendVolumeRequest) -> Self {
        Self {
            volume: CreateVolumePayload {
                size: request.size,
                snapshot_id: request.snapshot_id.as_deref(),
                volume_type: request.volume_type.as_deref(),
                availability_zone: request.availability_zone.as_deref(),
            },
        }
    }
}

/// Client for the block-storage API.
#[derive(Clone, Debug)]
pub struct CinderClient {
    session: OpenStackSession,
    endpoint: String,
}

impl CinderClient {
    /// Creates a client for the given project-scoped endpoint.
    #[must_use]
    pub fn new(session: OpenStackSession, endpoint: impl Into<String>) -> Self {
        Self {
            session,
            endpoint: endpoint.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        join(&self.endpoint, path)
    }
}

impl StorageBackend for CinderClient {
    fn create_volume<'a>(
        &'a self,
        request: &'a BackendVolumeRequest,
    ) -> BackendFuture<'a, BackendVolume> {
        Box::pin(async move {
            let builder = self
                .session
                .request(Method::POST, &self.url("volumes"))
                .json(&CreateVolumeBody::from(request));
            let envelope: VolumeEnvelope = self.session.send_json(builder).await?;
            Ok(envelope.volume.into())
        })
    }

    fn get_volume<'a>(&'a self, id: &'a BackendId) -> BackendFuture<'a, BackendVolume> {
        Box::pin(async move {
            let builder = self
                .session
                .request(Method::GET, &self.url(&format!("volumes/{id}")));
            let envelope: VolumeEnvelope = self.session.send_json(builder).await?;
            Ok(envelope.volume.into())
        })
    }

    fn delete_volume<'a>(&'a self, id: &'a BackendId) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let builder = self
                .session
                .request(Method::DELETE, &self.url(&format!("volumes/{id}")));
            self.session.send(builder).await.map(|_| ())
        })
    }

    fn list_volumes(&self) -> BackendFuture<'_, Vec<BackendVolume>> {
        Box::pin(async move {
            read_all_pages(self.url("volumes/detail"), |url| async move {
                let builder = self.session.request(Method::GET, &url);
                self.session.send_json::<VolumeListEnvelope>(builder).await
            })
            .await
        })
    }
}

/// Follows `rel=next` links from `first_url` until a page carries none.
///
/// A link back to an already fetched page fails the listing instead of
/// looping.
async fn read_all_pages<F, Fut>(
    first_url: String,
    mut fetch_page: F,
) -> Result<Vec<BackendVolume>, BackendError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<VolumeListEnvelope, BackendError>>,
{
    let mut volumes = Vec::new();
    let mut fetched = HashSet::new();
    let mut next = Some(first_url);
    while let Some(url) = next.take() {
        if !fetched.insert(url.clone()) {
            return Err(BackendError::Unavailable {
                message: format!("volume listing links back to {url}"),
            });
        }
        let page = fetch_page(url).await?;
        next = page.next_page().map(str::to_owned);
        volumes.extend(page.volumes.into_iter().map(BackendVolume::from));
    }
    Ok(volumes)
}
