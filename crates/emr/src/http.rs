//! Blocking HTTP implementation of [`EmrClient`].
//!
//! Endpoints, relative to the configured base URL:
//!
//! ```text
//! GET   clients/<id>                -> ClientRecord
//! GET   clients/<id>/metadata       -> object, or JSON string holding an object
//! GET   clients/<id>/data-richness  -> DataRichness
//! PATCH clients/<id>                <- ClientUpdate
//! ```
//!
//! Every request carries the API key as a bearer token. Rate limiting is the caller's job; a `429`
//! surfaces as [`EmrError::RateLimited`].

use crate::{
    parse_metadata, ClientRecord, ClientUpdate, DataRichness, EmrClient, EmrError, EmrResult,
    UserMetadata,
};
use reqwest::blocking::{Client, Response};
use reqwest::{StatusCode, Url};
use std::time::Duration;

/// HTTP timeout for a single EMR request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct HttpEmrClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl HttpEmrClient {
    /// Create a client for the EMR at `base_url`.
    ///
    /// # Errors
    ///
    /// - [`EmrError::MissingCredentials`] if `api_key` is blank
    /// - [`EmrError::InvalidUrl`] if `base_url` does not parse or is not http(s)
    /// - [`EmrError::Network`] if the underlying HTTP client cannot be built
    pub fn new(base_url: &str, api_key: &str) -> EmrResult<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(EmrError::MissingCredentials("API key is empty".into()));
        }

        let base_url = parse_base_url(base_url)?;
        tracing::info!("Creating EMR client for {}", base_url);

        let http = Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> EmrResult<Url> {
        endpoint(&self.base_url, segments)
    }

    fn get(&self, external_id: &str, segments: &[&str]) -> EmrResult<Response> {
        let url = self.endpoint(segments)?;
        tracing::debug!("GET {}", url);
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .send()?;
        check_status(response, external_id)
    }
}

impl EmrClient for HttpEmrClient {
    fn get_client(&self, external_id: &str) -> EmrResult<ClientRecord> {
        let response = self.get(external_id, &["clients", external_id])?;
        response
            .json::<ClientRecord>()
            .map_err(|e| EmrError::Decode(e.to_string()))
    }

    fn get_user_metadata(&self, external_id: &str) -> EmrResult<UserMetadata> {
        let response = self.get(external_id, &["clients", external_id, "metadata"])?;
        let value = response
            .json::<serde_json::Value>()
            .map_err(|e| EmrError::Decode(e.to_string()))?;
        parse_metadata(value)
    }

    fn get_data_richness(&self, external_id: &str) -> EmrResult<DataRichness> {
        let response = self.get(external_id, &["clients", external_id, "data-richness"])?;
        response
            .json::<DataRichness>()
            .map_err(|e| EmrError::Decode(e.to_string()))
    }

    fn update_client(&self, external_id: &str, update: &ClientUpdate) -> EmrResult<()> {
        let url = self.endpoint(&["clients", external_id])?;
        tracing::debug!("PATCH {}", url);
        let response = self
            .http
            .patch(url)
            .bearer_auth(&self.api_key)
            .json(update)
            .send()?;
        check_status(response, external_id)?;
        Ok(())
    }
}

fn parse_base_url(raw: &str) -> EmrResult<Url> {
    let cleaned = raw.trim();
    if cleaned.is_empty() {
        return Err(EmrError::MissingCredentials("EMR base URL is empty".into()));
    }

    let parsed =
        Url::parse(cleaned).map_err(|e| EmrError::InvalidUrl(format!("'{}': {}", cleaned, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(EmrError::InvalidUrl(format!(
            "URL must use http or https scheme, got: {}",
            parsed.scheme()
        )));
    }
    if parsed.cannot_be_a_base() {
        return Err(EmrError::InvalidUrl(format!("'{}' cannot be a base", cleaned)));
    }

    Ok(parsed)
}

/// Append path segments to `base`, percent-encoding each segment.
fn endpoint(base: &Url, segments: &[&str]) -> EmrResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| EmrError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn check_status(response: Response, external_id: &str) -> EmrResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(status_error(status, body, external_id))
}

fn status_error(status: StatusCode, body: String, external_id: &str) -> EmrError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EmrError::Unauthorized,
        StatusCode::NOT_FOUND => EmrError::NotFound(external_id.to_string()),
        StatusCode::TOO_MANY_REQUESTS => EmrError::RateLimited,
        _ => EmrError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        },
    }
}
