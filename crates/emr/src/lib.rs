//! # EMR Client
//!
//! Boundary to the external EMR that holds the source-of-truth patient records.
//!
//! The duplicate merge engine only consumes four calls from the EMR:
//! - client lookup (active flag and group assignment)
//! - user metadata lookup (used to find payment-processor references)
//! - clinical data richness lookup (document/form/medication/allergy/prescription counts)
//! - client update (the only mutation: deactivation)
//!
//! Those calls are expressed by the [`EmrClient`] trait so the engine receives the client as an
//! explicit dependency and tests can substitute a stub. [`HttpEmrClient`] is the production
//! implementation.
//!
//! **No engine concerns**: clustering, ranking and the safety policy belong in `dedup-core`.

mod http;

pub use http::HttpEmrClient;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum EmrError {
    #[error("missing EMR credentials: {0}")]
    MissingCredentials(String),
    #[error("invalid EMR url: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("EMR rejected the API credentials")]
    Unauthorized,
    #[error("EMR record not found: {0}")]
    NotFound(String),
    #[error("EMR rate limit exceeded")]
    RateLimited,
    #[error("unexpected EMR response (status {status}): {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("failed to decode EMR response: {0}")]
    Decode(String),
}

pub type EmrResult<T> = std::result::Result<T, EmrError>;

/// Client (patient) record as returned by the EMR client lookup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub active: bool,
    /// Cohort/group the client is assigned to, if any.
    #[serde(default)]
    pub user_group_id: Option<String>,
}

impl ClientRecord {
    /// Whether the client is assigned to any group construct.
    ///
    /// Blank group identifiers are treated as unassigned.
    pub fn has_group(&self) -> bool {
        self.user_group_id
            .as_deref()
            .is_some_and(|group| !group.trim().is_empty())
    }
}

/// Free-form metadata attached to a client.
pub type UserMetadata = BTreeMap<String, serde_json::Value>;

/// Decode a metadata payload.
///
/// EMRs commonly store client metadata as a JSON document serialised into a string field, so both
/// an object and a string containing an object are accepted. `null` and an empty string yield empty
/// metadata.
pub fn parse_metadata(value: serde_json::Value) -> EmrResult<UserMetadata> {
    match value {
        serde_json::Value::Null => Ok(UserMetadata::new()),
        serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
        serde_json::Value::String(raw) if raw.trim().is_empty() => Ok(UserMetadata::new()),
        serde_json::Value::String(raw) => {
            serde_json::from_str::<UserMetadata>(&raw).map_err(|e| EmrError::Decode(e.to_string()))
        }
        other => Err(EmrError::Decode(format!(
            "metadata must be an object or a JSON string, got {}",
            other
        ))),
    }
}

/// Counts of clinical artefacts held against a client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RichnessDetails {
    pub documents: u32,
    pub forms: u32,
    pub medications: u32,
    pub allergies: u32,
    pub prescriptions: u32,
}

/// Clinical data richness as reported by the EMR.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DataRichness {
    /// Score computed by the EMR. Informational only.
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub details: RichnessDetails,
}

/// Partial update sent to the client update call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientUpdate {
    pub active: bool,
}

impl ClientUpdate {
    /// The deactivation update. Applying it twice has the same effect as applying it once.
    pub fn deactivate() -> Self {
        Self { active: false }
    }
}

/// The EMR calls consumed by the duplicate merge engine.
///
/// Calls are blocking; the engine is a sequential batch job and paces calls itself.
pub trait EmrClient {
    fn get_client(&self, external_id: &str) -> EmrResult<ClientRecord>;

    fn get_user_metadata(&self, external_id: &str) -> EmrResult<UserMetadata>;

    fn get_data_richness(&self, external_id: &str) -> EmrResult<DataRichness>;

    /// Apply `update` to the client. Idempotent.
    fn update_client(&self, external_id: &str, update: &ClientUpdate) -> EmrResult<()>;
}
