//! Enrichment of cluster members with signals from the EMR.
//!
//! For each member, three lookups are issued sequentially, each paced by the [`Throttle`]:
//! client (active flag, group), user metadata (payment-processor reference) and clinical data
//! richness. If any lookup fails the record keeps its place in the cluster but gets
//! [`EnrichmentAttributes::conservative_default`], which the safety gate never actions.

use crate::cluster::{ClusterOrigin, DuplicateCluster};
use crate::error::{DedupError, DedupResult};
use crate::record::{CandidateRecord, EnrichedRecord, EnrichmentAttributes};
use crate::throttle::Throttle;
use emr_client::{EmrClient, EmrResult, UserMetadata};

/// A duplicate cluster whose members carry enrichment attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnrichedCluster {
    key: String,
    origin: ClusterOrigin,
    members: Vec<EnrichedRecord>,
}

impl EnrichedCluster {
    /// # Errors
    ///
    /// Returns `DedupError::InvalidInput` if fewer than two members are given.
    pub fn new(
        key: impl Into<String>,
        origin: ClusterOrigin,
        members: Vec<EnrichedRecord>,
    ) -> DedupResult<Self> {
        let key = key.into();
        if members.len() < 2 {
            return Err(DedupError::InvalidInput(format!(
                "cluster {} needs at least two members, got {}",
                key,
                members.len()
            )));
        }
        Ok(Self {
            key,
            origin,
            members,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn origin(&self) -> ClusterOrigin {
        self.origin
    }

    pub fn members(&self) -> &[EnrichedRecord] {
        &self.members
    }

    pub fn enrichment_failures(&self) -> usize {
        self.members
            .iter()
            .filter(|m| m.enrichment.enrichment_failed())
            .count()
    }
}

pub struct Enricher<'a> {
    emr: &'a dyn EmrClient,
    throttle: &'a dyn Throttle,
    payment_metadata_keys: &'a [String],
}

impl<'a> Enricher<'a> {
    pub fn new(
        emr: &'a dyn EmrClient,
        throttle: &'a dyn Throttle,
        payment_metadata_keys: &'a [String],
    ) -> Self {
        Self {
            emr,
            throttle,
            payment_metadata_keys,
        }
    }

    /// Enrich every member of `cluster`, in member order.
    pub fn enrich_cluster(&self, cluster: &DuplicateCluster) -> EnrichedCluster {
        let members = cluster
            .members()
            .iter()
            .map(|record| EnrichedRecord {
                record: record.clone(),
                enrichment: self.enrich_record(record),
            })
            .collect();

        EnrichedCluster {
            key: cluster.key().to_string(),
            origin: cluster.origin(),
            members,
        }
    }

    /// Fetch the enrichment attributes of one record, falling back to the conservative defaults on
    /// any error.
    pub fn enrich_record(&self, record: &CandidateRecord) -> EnrichmentAttributes {
        match self.fetch(record.id()) {
            Ok(attrs) => attrs,
            Err(e) => {
                tracing::warn!(
                    "Enrichment failed for record {}, treating it as inactive: {}",
                    record.id(),
                    e
                );
                EnrichmentAttributes::conservative_default(e.to_string())
            }
        }
    }

    fn fetch(&self, external_id: &str) -> EmrResult<EnrichmentAttributes> {
        self.throttle.pace();
        let client = self.emr.get_client(external_id)?;

        self.throttle.pace();
        let metadata = self.emr.get_user_metadata(external_id)?;

        self.throttle.pace();
        let richness = self.emr.get_data_richness(external_id)?;

        Ok(EnrichmentAttributes {
            is_active: client.active,
            has_group: client.has_group(),
            payment_link_id: payment_link_from_metadata(&metadata, self.payment_metadata_keys),
            data_richness: richness.details,
            enrichment_error: None,
        })
    }
}

/// The first non-empty payment-processor reference found under `keys`, in key order.
pub fn payment_link_from_metadata<S: AsRef<str>>(
    metadata: &UserMetadata,
    keys: &[S],
) -> Option<String> {
    keys.iter().find_map(|key| {
        let value = match metadata.get(key.as_ref())? {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Number(n) => n.to_string(),
            _ => return None,
        };
        (!value.is_empty()).then_some(value)
    })
}
