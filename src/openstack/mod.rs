//! HTTP clients for the OpenStack block-storage and compute APIs.
//!
//! Both clients share an [`OpenStackSession`] that owns the HTTP client and
//! the auth token and classifies every non-success response into a
//! [`BackendError`] before any payload reaches the translation layer.

mod cinder;
mod nova;

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::backend::BackendError;

pub use cinder::CinderClient;
pub use nova::NovaClient;

/// Header carrying the Keystone token.
const AUTH_HEADER: &str = "X-Auth-Token";

/// Authenticated HTTP session shared by the service clients.
#[derive(Clone, Debug)]
pub struct OpenStackSession {
    client: reqwest::Client,
    token: String,
}

impl OpenStackSession {
    /// Builds a session with the given token and per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Unavailable`] when the HTTP client cannot be
    /// constructed.
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| BackendError::Unavailable {
                message: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self {
            client,
            token: token.into(),
        })
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(AUTH_HEADER, &self.token)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Sends a request and returns the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<Vec<u8>, BackendError> {
        let response = request
            .send()
            .await
            .map_err(|err| BackendError::Unavailable {
                message: err.to_string(),
            })?;
        let status = response.status();
        let url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|err| BackendError::Unavailable {
                message: err.to_string(),
            })?;
        debug!(%url, status = status.as_u16(), "backend response");
        if status.is_success() {
            return Ok(body.to_vec());
        }
        Err(classify(status, &body))
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, BackendError> {
        let body = self.send(request).await?;
        decode(&body)
    }
}

/// Joins an endpoint base URL and a path without doubling slashes.
fn join(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, BackendError> {
    serde_json::from_slice(body).map_err(|err| BackendError::Unavailable {
        message: format!("undecodable backend response: {err}"),
    })
}

/// Classifies a non-success response.
fn classify(status: StatusCode, body: &[u8]) -> BackendError {
    let message = fault_message(body).unwrap_or_else(|| {
        let text = String::from_utf8_lossy(body).trim().to_owned();
        if text.is_empty() {
            status.to_string()
        } else {
            text
        }
    });
    match status {
        StatusCode::NOT_FOUND => BackendError::NotFound { message },
        StatusCode::CONFLICT => BackendError::Conflict { message },
        StatusCode::BAD_REQUEST => BackendError::BadRequest { message },
        _ => BackendError::Unavailable {
            message: format!("{status}: {message}"),
        },
    }
}

/// Extracts the message from an OpenStack fault body such as
/// `{"itemNotFound": {"code": 404, "message": "..."}}`.
fn fault_message(body: &[u8]) -> Option<String> {
    let Value::Object(fields) = serde_json::from_slice::<Value>(body).ok()? else {
        return None;
    };
    fields.values().find_map(|fault| {
        fault
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(StatusCode::NOT_FOUND, "NotFound")]
    #[case(StatusCode::CONFLICT, "Conflict")]
    #[case(StatusCode::BAD_REQUEST, "BadRequest")]
    #[case(StatusCode::INTERNAL_SERVER_ERROR, "Unavailable")]
    #[case(StatusCode::FORBIDDEN, "Unavailable")]
    fn statuses_are_classified(#[case] status: StatusCode, #[case] expected: &str) {
        let kind = match classify(status, b"") {
            BackendError::NotFound { .. } => "NotFound",
            BackendError::Conflict { .. } => "Conflict",
            BackendError::BadRequest { .. } => "BadRequest",
            BackendError::Unavailable { .. } => "Unavailable",
        };
        assert_eq!(kind, expected);
    }

    #[test]
    fn fault_body_message_is_extracted() {
        let body = br#"{"itemNotFound": {"code": 404, "message": "Volume bv-9 could not be found."}}"#;
        assert_eq!(
            classify(StatusCode::NOT_FOUND, body),
            BackendError::NotFound {
                message: String::from("Volume bv-9 could not be found."),
            }
        );
    }

    #[test]
    fn plain_text_bodies_are_kept() {
        let err = classify(StatusCode::BAD_GATEWAY, b"upstream down");
        assert!(err.to_string().contains("upstream down"));
    }

    #[rstest]
    #[case("https://cloud.example/v3/p/", "/volumes", "https://cloud.example/v3/p/volumes")]
    #[case("https://cloud.example/v3/p", "volumes/detail", "https://cloud.example/v3/p/volumes/detail")]
    fn urls_join_cleanly(#[case] base: &str, #[case] path: &str, #[case] expected: &str) {
        assert_eq!(join(base, path), expected);
    }
}
