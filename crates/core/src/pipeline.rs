//! The deduplication run, end to end.
//!
//! roster → clusters → enrichment → master selection and safety gate → merge executor → report.
//!
//! Collaborators are injected at construction. The EMR client and throttle are shared by
//! enrichment and, in execute mode, by the [`LiveMutator`](crate::executor::LiveMutator) the
//! caller builds around the same instances.

use crate::audit::{AuditLog, RunContext};
use crate::cluster::{build_clusters, DuplicateCluster};
use crate::config::DedupConfig;
use crate::decision::{decide, MergeDecision};
use crate::enrich::{EnrichedCluster, Enricher};
use crate::error::DedupResult;
use crate::executor::{MergeExecutor, Mutator};
use crate::report::RunReport;
use crate::roster::RosterSource;
use crate::safety::SafetyGate;
use crate::throttle::Throttle;
use emr_client::EmrClient;
use std::sync::Arc;

pub struct DedupEngine<'a> {
    config: Arc<DedupConfig>,
    emr: &'a dyn EmrClient,
    throttle: &'a dyn Throttle,
}

impl<'a> DedupEngine<'a> {
    pub fn new(
        config: Arc<DedupConfig>,
        emr: &'a dyn EmrClient,
        throttle: &'a dyn Throttle,
    ) -> Self {
        Self {
            config,
            emr,
            throttle,
        }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    /// Run one full pass over the roster.
    ///
    /// Only a roster failure is returned as an error, and it happens before any cluster is
    /// processed. Per-record enrichment and mutation failures are recorded in the report.
    pub fn run(
        &self,
        roster_source: &dyn RosterSource,
        mutator: &dyn Mutator,
        audit: &mut AuditLog,
    ) -> DedupResult<RunReport> {
        let roster = roster_source.fetch_roster()?;
        let context = RunContext::new(mutator.mode(), self.config.policy());
        tracing::info!(
            "Starting duplicate merge run {} (mode: {}, policy: {}, roster size: {})",
            context.run_id,
            context.mode,
            context.policy,
            roster.len()
        );

        let clusters = build_clusters(&roster, self.config.placeholder_domains());
        for cluster in &clusters {
            tracing::info!(
                "Cluster {} ({}) with {} members",
                cluster.key(),
                cluster.origin(),
                cluster.len()
            );
        }

        let enriched = self.enrich(&clusters);
        let enriched_records: usize = enriched.iter().map(|c| c.members().len()).sum();
        let enrichment_failures: usize = enriched
            .iter()
            .map(EnrichedCluster::enrichment_failures)
            .sum();
        if enrichment_failures > 0 {
            tracing::warn!(
                "Enrichment failed for {} of {} records; those records will not be actioned",
                enrichment_failures,
                enriched_records
            );
        }

        let decisions = self.decide_all(&enriched)?;
        let execution = MergeExecutor::new(mutator, audit, context).execute(decisions);

        Ok(RunReport {
            context,
            roster_size: roster.len(),
            enriched_records,
            enrichment_failures,
            execution,
        })
    }

    /// Enrich every cluster in order, pausing between batches of clusters.
    pub fn enrich(&self, clusters: &[DuplicateCluster]) -> Vec<EnrichedCluster> {
        let enricher = Enricher::new(
            self.emr,
            self.throttle,
            self.config.payment_metadata_keys(),
        );
        clusters
            .iter()
            .enumerate()
            .map(|(index, cluster)| {
                let enriched = enricher.enrich_cluster(cluster);
                self.throttle.cluster_finished(index + 1);
                enriched
            })
            .collect()
    }

    /// Master selection and safety gate for every enriched cluster. No remote calls.
    pub fn decide_all(&self, clusters: &[EnrichedCluster]) -> DedupResult<Vec<MergeDecision>> {
        let gate = SafetyGate::new(self.config.policy());
        clusters.iter().map(|cluster| decide(cluster, &gate)).collect()
    }
}
