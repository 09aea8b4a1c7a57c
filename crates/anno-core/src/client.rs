//! Annotation server client
//!
//! Stateless request/response wrapper over the sync protocol: one HTTP
//! endpoint, request shaped by intent. Lookups and deletes are
//! form-encoded POSTs; pushes POST the raw annotation JSON.
//!
//! Every failure is reported as an explicit [`ClientError`] kind. The
//! sync engine branches on the kind and treats all of them as "nothing
//! to merge this round"; nothing network-related escapes its boundary.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::models::Annotation;

/// Errors from the annotation server boundary
#[derive(Error, Debug)]
pub enum ClientError {
    /// Network unreachable, timeout, TLS failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("Server returned status {0}")]
    Status(u16),

    /// Response body was not the expected JSON
    #[error("Malformed server response: {0}")]
    Parse(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Which document key scopes a fetch or delete request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKey {
    /// By document content hash
    Checksum(String),
    /// By external target URL (cross-edition matching)
    Target(String),
}

impl LookupKey {
    fn form_field(&self) -> (&'static str, &str) {
        match self {
            LookupKey::Checksum(hash) => ("checksum", hash),
            LookupKey::Target(url) => ("w3c_hasTarget", url),
        }
    }
}

/// URLs handed back by the server after a successful push
#[derive(Debug, Clone, Deserialize)]
pub struct PushReceipt {
    #[serde(
        rename = "annotationurl",
        default,
        deserialize_with = "crate::models::null_to_empty"
    )]
    pub annotation_url: String,
    #[serde(
        rename = "bodyurl",
        default,
        deserialize_with = "crate::models::null_to_empty"
    )]
    pub body_url: String,
}

/// The remote annotation store, as seen by the sync engine
///
/// The HTTP implementation is [`AnnoClient`]; tests substitute an
/// in-memory fake.
pub trait AnnotationService {
    /// Resolve an opaque user string to a server-assigned user id
    fn resolve_user_id(&self, user_string: &str) -> ClientResult<String>;

    /// Fetch the remote annotation set for one document
    fn fetch(&self, key: &LookupKey) -> ClientResult<Vec<Annotation>>;

    /// Push one annotation, returning the URLs the server assigned
    fn push(&self, annotation: &Annotation) -> ClientResult<PushReceipt>;

    /// Request deletion of one annotation by uuid
    fn delete(&self, key: &LookupKey, uuid: &str) -> ClientResult<()>;
}

/// HTTP client for the annotation server
pub struct AnnoClient {
    endpoint: String,
    http: reqwest::blocking::Client,
}

impl AnnoClient {
    /// Create a client for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("anno/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            endpoint: endpoint.into(),
            http,
        })
    }

    fn post_form(&self, fields: &[(&str, &str)]) -> ClientResult<String> {
        let response = self.http.post(&self.endpoint).form(fields).send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        Ok(response.text()?)
    }
}

impl AnnotationService for AnnoClient {
    fn resolve_user_id(&self, user_string: &str) -> ClientResult<String> {
        debug!("Resolving user id at {}", self.endpoint);
        let body = self.post_form(&[("getidforuser", user_string)])?;

        #[derive(Deserialize)]
        struct UserIdResponse {
            userid: String,
        }

        let parsed: UserIdResponse = serde_json::from_str(&body)?;
        Ok(parsed.userid)
    }

    fn fetch(&self, key: &LookupKey) -> ClientResult<Vec<Annotation>> {
        let (field, value) = key.form_field();
        debug!("Fetching annotations by {} from {}", field, self.endpoint);
        let body = self.post_form(&[(field, value)])?;

        if body.trim().is_empty() {
            // The server answers an unknown document with an empty body
            return Ok(Vec::new());
        }

        let annotations: Vec<Annotation> = serde_json::from_str(&body)?;
        Ok(annotations)
    }

    fn push(&self, annotation: &Annotation) -> ClientResult<PushReceipt> {
        debug!("Pushing annotation {} to {}", annotation.uuid, self.endpoint);
        let json = annotation.to_json()?;

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json")
            .body(json)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status(status.as_u16()));
        }

        let body = response.text()?;
        let receipt: PushReceipt = serde_json::from_str(&body)?;
        Ok(receipt)
    }

    fn delete(&self, key: &LookupKey, uuid: &str) -> ClientResult<()> {
        let (field, value) = key.form_field();
        debug!("Requesting delete of {} by {}", uuid, field);
        // The ack body is implementation-defined; only the status matters
        self.post_form(&[(field, value), ("delete_anid", uuid)])?;
        Ok(())
    }
}
