//! Candidate records and the attributes attached to them during enrichment.
//!
//! A [`CandidateRecord`] is a read-only snapshot of one patient identity as the roster knew it at
//! the start of the run. Enrichment never mutates it; the remote signals are carried alongside in
//! [`EnrichmentAttributes`] and paired up in an [`EnrichedRecord`].

use crate::constants::{CLINICAL_ENTRY_WEIGHT, DOCUMENT_WEIGHT, FORM_WEIGHT};
use chrono::{DateTime, Utc};
use emr_client::RichnessDetails;

/// One patient identity from the roster snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateRecord {
    id: String,
    first_name: String,
    last_name: String,
    email: Option<String>,
    dob: Option<String>,
    created_at: DateTime<Utc>,
}

impl CandidateRecord {
    /// Creates a candidate record.
    ///
    /// Blank email and date-of-birth values are stored as absent so every downstream check only
    /// has to look at `Option`.
    pub fn new(
        id: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: Option<String>,
        dob: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: non_blank(email),
            dob: non_blank(dob),
            created_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Date of birth as an ISO date string. Compared by exact string equality.
    pub fn dob(&self) -> Option<&str> {
        self.dob.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Remote signals fetched for a record during enrichment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichmentAttributes {
    pub is_active: bool,
    pub has_group: bool,
    /// Payment-processor customer reference. Presence vetoes retirement.
    pub payment_link_id: Option<String>,
    pub data_richness: RichnessDetails,
    /// Set when enrichment failed and the conservative defaults were applied.
    pub enrichment_error: Option<String>,
}

impl EnrichmentAttributes {
    /// Defaults applied when any enrichment call for a record fails.
    ///
    /// An inactive record is never actioned by the safety gate, so a failed lookup can only ever
    /// lead to inaction.
    pub fn conservative_default(error: impl Into<String>) -> Self {
        Self {
            is_active: false,
            has_group: false,
            payment_link_id: None,
            data_richness: RichnessDetails::default(),
            enrichment_error: Some(error.into()),
        }
    }

    pub fn enrichment_failed(&self) -> bool {
        self.enrichment_error.is_some()
    }

    pub fn richness_score(&self) -> u64 {
        richness_score(&self.data_richness)
    }
}

/// Weighted sum of clinical artefacts, documents weighted highest.
pub fn richness_score(details: &RichnessDetails) -> u64 {
    u64::from(details.documents) * DOCUMENT_WEIGHT
        + u64::from(details.forms) * FORM_WEIGHT
        + (u64::from(details.medications)
            + u64::from(details.allergies)
            + u64::from(details.prescriptions))
            * CLINICAL_ENTRY_WEIGHT
}

/// A candidate record paired with its enrichment attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichedRecord {
    pub record: CandidateRecord,
    pub enrichment: EnrichmentAttributes,
}

impl EnrichedRecord {
    pub fn id(&self) -> &str {
        self.record.id()
    }
}
