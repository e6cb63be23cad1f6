//! Merge execution: applying retirement decisions.
//!
//! "Merge" always means designate one master and deactivate the rest. Records are never deleted
//! and no field-level data is consolidated.
//!
//! The choice between dry-run and execute is made once, by picking a [`Mutator`]:
//! [`NoopMutator`] only reports what it would do, [`LiveMutator`] calls the EMR. Everything before
//! the mutator call, including the decision lines logged for each cluster, is identical in both
//! modes.

use crate::audit::{AuditEvent, AuditLog, RunContext, RunMode};
use crate::decision::MergeDecision;
use crate::safety::Disposition;
use crate::throttle::Throttle;
use chrono::Utc;
use emr_client::{ClientUpdate, EmrClient, EmrResult};

/// What a mutator did with a deactivation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationEffect {
    Deactivated,
    Simulated,
}

pub trait Mutator {
    fn mode(&self) -> RunMode;

    /// Deactivate one record. Must be idempotent.
    fn deactivate(&self, external_id: &str) -> EmrResult<MutationEffect>;

    /// Called after each cluster's candidates have been handled. `clusters_done` counts from 1.
    fn cluster_finished(&self, _clusters_done: usize) {}
}

/// Dry-run mutator. Never touches the EMR.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMutator;

impl Mutator for NoopMutator {
    fn mode(&self) -> RunMode {
        RunMode::DryRun
    }

    fn deactivate(&self, external_id: &str) -> EmrResult<MutationEffect> {
        tracing::info!("[dry-run] would deactivate record {}", external_id);
        Ok(MutationEffect::Simulated)
    }
}

/// Execute-mode mutator. Sets `active=false` on the EMR, one paced call per record.
pub struct LiveMutator<'a> {
    emr: &'a dyn EmrClient,
    throttle: &'a dyn Throttle,
}

impl<'a> LiveMutator<'a> {
    pub fn new(emr: &'a dyn EmrClient, throttle: &'a dyn Throttle) -> Self {
        Self { emr, throttle }
    }
}

impl Mutator for LiveMutator<'_> {
    fn mode(&self) -> RunMode {
        RunMode::Execute
    }

    fn deactivate(&self, external_id: &str) -> EmrResult<MutationEffect> {
        self.throttle.pace();
        self.emr
            .update_client(external_id, &ClientUpdate::deactivate())?;
        Ok(MutationEffect::Deactivated)
    }

    fn cluster_finished(&self, clusters_done: usize) {
        self.throttle.cluster_finished(clusters_done);
    }
}

/// What finally happened to a retirement candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Archived,
    WouldArchive,
    ArchiveFailed(String),
    /// Not actioned; the disposition says why.
    Skipped(Disposition),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Archived => "archived",
            Outcome::WouldArchive => "would-archive",
            Outcome::ArchiveFailed(_) => "archive-failed",
            Outcome::Skipped(Disposition::SkipAlreadyInactive) => "already-inactive",
            Outcome::Skipped(_) => "skipped",
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::ArchiveFailed(error) => Some(error),
            _ => None,
        }
    }
}

/// Run-level counters.
///
/// Already-inactive candidates need no action and are counted apart from skips.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunTally {
    pub clusters_processed: usize,
    pub archived: usize,
    pub would_archive: usize,
    pub archive_failed: usize,
    pub skipped_payment_linked: usize,
    pub skipped_group_conflict: usize,
    pub already_inactive: usize,
    pub audit_failures: usize,
}

impl RunTally {
    pub fn skipped(&self) -> usize {
        self.skipped_payment_linked + self.skipped_group_conflict
    }

    fn count(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Archived => self.archived += 1,
            Outcome::WouldArchive => self.would_archive += 1,
            Outcome::ArchiveFailed(_) => self.archive_failed += 1,
            Outcome::Skipped(Disposition::SkipPaymentLinked) => self.skipped_payment_linked += 1,
            Outcome::Skipped(Disposition::SkipGroupConflict) => self.skipped_group_conflict += 1,
            Outcome::Skipped(Disposition::SkipAlreadyInactive) => self.already_inactive += 1,
            // Retire never maps to Skipped.
            Outcome::Skipped(Disposition::Retire) => {}
        }
    }
}

/// A decision together with the outcome of each candidate, in candidate order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterExecution {
    pub decision: MergeDecision,
    pub outcomes: Vec<Outcome>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionReport {
    pub mode: RunMode,
    pub clusters: Vec<ClusterExecution>,
    /// Decision lines in the order they were logged, before any mutation of their cluster.
    pub decision_log: Vec<String>,
    pub tally: RunTally,
}

pub struct MergeExecutor<'a> {
    mutator: &'a dyn Mutator,
    audit: &'a mut AuditLog,
    context: RunContext,
}

impl<'a> MergeExecutor<'a> {
    pub fn new(mutator: &'a dyn Mutator, audit: &'a mut AuditLog, context: RunContext) -> Self {
        Self {
            mutator,
            audit,
            context,
        }
    }

    /// Apply every decision in order.
    ///
    /// A failed deactivation is logged and counted; it never stops the run.
    pub fn execute(&mut self, decisions: Vec<MergeDecision>) -> ExecutionReport {
        let mode = self.mutator.mode();
        let mut tally = RunTally::default();
        let mut decision_log = Vec::new();
        let mut clusters = Vec::with_capacity(decisions.len());

        for decision in decisions {
            for line in decision.decision_lines() {
                tracing::info!("decision {}", line);
                decision_log.push(line);
            }

            let mut outcomes = Vec::with_capacity(decision.candidates.len());
            for candidate in &decision.candidates {
                let outcome = self.apply(candidate.record.id(), candidate.disposition);
                tally.count(&outcome);
                self.audit_outcome(
                    &decision,
                    candidate.record.id(),
                    candidate.disposition,
                    &outcome,
                    &mut tally,
                );
                outcomes.push(outcome);
            }

            tally.clusters_processed += 1;
            self.mutator.cluster_finished(tally.clusters_processed);
            clusters.push(ClusterExecution { decision, outcomes });
        }

        tracing::info!(
            "Merge run complete ({}): {} clusters, {} archived, {} would archive, {} failed, {} skipped, {} already inactive",
            mode,
            tally.clusters_processed,
            tally.archived,
            tally.would_archive,
            tally.archive_failed,
            tally.skipped(),
            tally.already_inactive
        );

        ExecutionReport {
            mode,
            clusters,
            decision_log,
            tally,
        }
    }

    fn apply(&self, record_id: &str, disposition: Disposition) -> Outcome {
        if !disposition.is_retire() {
            return Outcome::Skipped(disposition);
        }

        match self.mutator.deactivate(record_id) {
            Ok(MutationEffect::Deactivated) => {
                tracing::info!("Archived record {}", record_id);
                Outcome::Archived
            }
            Ok(MutationEffect::Simulated) => Outcome::WouldArchive,
            Err(e) => {
                tracing::error!("Failed to deactivate record {}: {}", record_id, e);
                Outcome::ArchiveFailed(e.to_string())
            }
        }
    }

    fn audit_outcome(
        &mut self,
        decision: &MergeDecision,
        record_id: &str,
        disposition: Disposition,
        outcome: &Outcome,
        tally: &mut RunTally,
    ) {
        let event = AuditEvent {
            run_id: self.context.run_id,
            timestamp: Utc::now(),
            mode: self.context.mode,
            policy: self.context.policy,
            cluster_key: decision.cluster_key.clone(),
            master_id: decision.master_id().to_string(),
            record_id: record_id.to_string(),
            disposition,
            outcome: outcome.as_str().to_string(),
            error: outcome.error().map(str::to_string),
        };
        if let Err(e) = self.audit.record(&event) {
            tracing::error!("Failed to write audit event for record {}: {}", record_id, e);
            tally.audit_failures += 1;
        }
    }
}
