//! Per-cluster merge decisions: who is master, and what happens to everyone else.
//!
//! Decisions are computed from enrichment data alone and before any mutator is involved, so a
//! dry run and an execute run over the same inputs produce identical decisions.

use crate::cluster::ClusterOrigin;
use crate::enrich::EnrichedCluster;
use crate::error::{DedupError, DedupResult};
use crate::record::EnrichedRecord;
use crate::safety::{Disposition, SafetyGate};
use crate::scoring::{rank_members, RankKey};

/// A retirement candidate and what the safety gate decided for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateDecision {
    pub record: EnrichedRecord,
    pub rank: RankKey,
    pub disposition: Disposition,
}

/// The outcome of master selection and the safety gate for one cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeDecision {
    pub cluster_key: String,
    pub origin: ClusterOrigin,
    pub master: EnrichedRecord,
    pub master_rank: RankKey,
    /// Every non-master member, best-ranked first.
    pub candidates: Vec<CandidateDecision>,
}

impl MergeDecision {
    pub fn master_id(&self) -> &str {
        self.master.id()
    }

    pub fn count(&self, disposition: Disposition) -> usize {
        self.candidates
            .iter()
            .filter(|c| c.disposition == disposition)
            .count()
    }

    /// One line per candidate, `cluster=<key> master=<id> record=<id> disposition=<code>`.
    ///
    /// This is what both modes log before any mutation is attempted.
    pub fn decision_lines(&self) -> Vec<String> {
        self.candidates
            .iter()
            .map(|c| {
                format!(
                    "cluster={} master={} record={} disposition={}",
                    self.cluster_key,
                    self.master_id(),
                    c.record.id(),
                    c.disposition
                )
            })
            .collect()
    }
}

/// Rank the cluster, pick the master and run every other member through the safety gate.
///
/// # Errors
///
/// Returns `DedupError::InvalidInput` for a cluster without members.
pub fn decide(cluster: &EnrichedCluster, gate: &SafetyGate) -> DedupResult<MergeDecision> {
    let mut ranked = rank_members(cluster.members(), gate.policy()).into_iter();
    let master = ranked.next().ok_or_else(|| {
        DedupError::InvalidInput(format!("cluster {} has no members", cluster.key()))
    })?;
    let rest: Vec<_> = ranked.collect();

    let candidate_records: Vec<EnrichedRecord> = rest.iter().map(|r| r.member.clone()).collect();
    let dispositions = gate.evaluate_cluster(&master.member, &candidate_records);

    let candidates = rest
        .into_iter()
        .zip(dispositions)
        .map(|(ranked, disposition)| CandidateDecision {
            record: ranked.member,
            rank: ranked.key,
            disposition,
        })
        .collect();

    Ok(MergeDecision {
        cluster_key: cluster.key().to_string(),
        origin: cluster.origin(),
        master: master.member,
        master_rank: master.key,
        candidates,
    })
}
