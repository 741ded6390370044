//! Compute (Nova v2.1) client: volume attachments and the
//! delete-on-termination extension.

use reqwest::Method;
use serde::{Deserialize, Deserializer, Serialize};

use crate::backend::{BackendFuture, ComputeBackend, DeleteOnTerminationFlag};
use crate::ids::BackendId;

use super::{OpenStackSession, join};

/// Path of the deployment-specific delete-on-termination extension.
const DELETE_ON_TERMINATION_PATH: &str = "os-volume-delete-on-termination";

#[derive(Debug, Serialize)]
struct AttachBody<'a> {
    #[serde(rename = "volumeAttachment")]
    volume_attachment: AttachPayload<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttachPayload<'a> {
    volume_id: &'a str,
    device: &'a str,
}

#[derive(Debug, Serialize)]
struct FlagUpdateBody {
    delete_on_termination: String,
}

#[derive(Debug, Deserialize)]
struct FlagEnvelope {
    volume: WireFlag,
}

#[derive(Debug, Deserialize)]
struct WireFlag {
    #[serde(default)]
    volume_id: Option<String>,
    #[serde(deserialize_with = "lenient_bool")]
    delete_on_termination: bool,
}

/// Accepts `true`, `"true"`, and `"True"`; the extension echoes the string
/// form it was sent.
fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }
    match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => Ok(value),
        Flag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "expected a boolean flag, got '{other}'"
            ))),
        },
    }
}

impl WireFlag {
    fn into_flag(self, requested: &BackendId) -> DeleteOnTerminationFlag {
        DeleteOnTerminationFlag {
            volume_id: self
                .volume_id
                .map_or_else(|| requested.clone(), BackendId::new),
            delete_on_termination: self.delete_on_termination,
        }
    }
}

/// Client for the compute API.
#[derive(Clone, Debug)]
pub struct NovaClient {
    session: OpenStackSession,
    endpoint: String,
}

impl NovaClient {
    /// Creates a client for the given compute endpoint.
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

impl ComputeBackend for NovaClient {
    fn attach_volume<'a>(
        &'a self,
        server_id: &'a BackendId,
        volume_id: &'a BackendId,
        device: &'a str,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let body = AttachBody {
                volume_attachment: AttachPayload {
                    volume_id: volume_id.as_str(),
                    device,
                },
            };
            let builder = self
                .session
                .request(
                    Method::POST,
                    &self.url(&format!("servers/{server_id}/os-volume_attachments")),
                )
                .json(&body);
            self.session.send(builder).await.map(|_| ())
        })
    }

    fn detach_volume<'a>(
        &'a self,
        server_id: &'a BackendId,
        volume_id: &'a BackendId,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let builder = self.session.request(
                Method::DELETE,
                &self.url(&format!(
                    "servers/{server_id}/os-volume_attachments/{volume_id}"
                )),
            );
            self.session.send(builder).await.map(|_| ())
        })
    }

    fn delete_on_termination<'a>(
        &'a self,
        volume_id: &'a BackendId,
    ) -> BackendFuture<'a, DeleteOnTerminationFlag> {
        Box::pin(async move {
            let builder = self.session.request(
                Method::GET,
                &self.url(&format!("{DELETE_ON_TERMINATION_PATH}/{volume_id}")),
            );
            let envelope: FlagEnvelope = self.session.send_json(builder).await?;
            Ok(envelope.volume.into_flag(volume_id))
        })
    }

    fn set_delete_on_termination<'a>(
        &'a self,
        volume_id: &'a BackendId,
        value: bool,
    ) -> BackendFuture<'a, DeleteOnTerminationFlag> {
        Box::pin(async move {
            let body = FlagUpdateBody {
                delete_on_termination: if value { "True" } else { "False" }.to_owned(),
            };
            let builder = self
                .session
                .request(
                    Method::PUT,
                    &self.url(&format!("{DELETE_ON_TERMINATION_PATH}/{volume_id}")),
                )
                .json(&body);
            let envelope: FlagEnvelope = self.session.send_json(builder).await?;
            Ok(envelope.volume.into_flag(volume_id))
        })
    }
}
