//! Purpose: Fetch HAL documents over HTTP and decode them in one step.
//! Exports: `HalClient`, `FetchedDocument`.
//! Role: Thin transport layer; all document interpretation stays in `core`.
//! Invariants: Requests always send `Accept: application/hal+json`.
//! Invariants: Non-success statuses and transport failures surface as `Http`.

use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use ureq::Agent;
use url::Url;

use crate::core::descriptor::HalResource;
use crate::core::document::decode_value;
use crate::core::error::{Error, ErrorKind};

pub type ApiResult<T> = Result<T, Error>;

const HAL_MEDIA_TYPE: &str = "application/hal+json";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A raw fetch result: the parsed document plus transport metadata.
#[derive(Clone, Debug)]
pub struct FetchedDocument {
    pub url: String,
    pub status: u16,
    pub fetched_at: String,
    pub document: Value,
}

#[derive(Debug)]
pub struct HalClient {
    agent: Agent,
    base_url: Url,
    token: Option<String>,
}

impl HalClient {
    pub fn new(base_url: &str) -> ApiResult<Self> {
        let base_url = Url::parse(base_url).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid base URL: {base_url}"))
                .with_source(err)
        })?;
        Ok(Self {
            agent: build_agent(DEFAULT_TIMEOUT),
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    /// Fetches `path` (relative to the base URL, or absolute) and decodes the
    /// body through the typed pipeline.
    pub fn fetch<T: HalResource>(&self, path: &str) -> ApiResult<T> {
        let fetched = self.fetch_document(path)?;
        decode_value(&fetched.document)
    }

    /// Fetches `path` and returns the raw document with transport metadata.
    pub fn fetch_document(&self, path: &str) -> ApiResult<FetchedDocument> {
        let url = self.resolve_url(path)?;
        tracing::debug!(url = url.as_str(), "fetching HAL document");

        let mut request = self.agent.get(url.as_str()).set("Accept", HAL_MEDIA_TYPE);
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }

        let response = request.call().map_err(|err| match err {
            ureq::Error::Status(status, _) => Error::new(ErrorKind::Http)
                .with_message(format!("request to {url} failed"))
                .with_hint(format!("Server answered with HTTP status {status}.")),
            ureq::Error::Transport(transport) => Error::new(ErrorKind::Http)
                .with_message(format!("request to {url} failed"))
                .with_source(transport),
        })?;

        let status = response.status();
        let body = response.into_string().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message(format!("failed to read response body from {url}"))
                .with_source(err)
        })?;
        let document: Value = serde_json::from_str(&body).map_err(|err| {
            Error::new(ErrorKind::Decode)
                .with_message(format!("response from {url} is not valid JSON"))
                .with_source(err)
        })?;

        Ok(FetchedDocument {
            url: url.as_str().to_string(),
            status,
            fetched_at: rfc3339_now(),
            document,
        })
    }

    fn resolve_url(&self, path: &str) -> ApiResult<Url> {
        self.base_url.join(path).map_err(|err| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("cannot resolve {path} against the base URL"))
                .with_source(err)
        })
    }
}

fn build_agent(timeout: Duration) -> Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

fn rfc3339_now() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
