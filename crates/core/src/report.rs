//! Markdown report of one engine run.
//!
//! The report is overwritten on every run. Metadata fields use the `**Key:** value` form so the
//! file reads well both rendered and as plain text.

use crate::audit::RunContext;
use crate::cluster::ClusterOrigin;
use crate::constants::UNTRUSTWORTHY_FAILURE_RATIO;
use crate::error::{DedupError, DedupResult};
use crate::executor::{ExecutionReport, Outcome};
use crate::record::EnrichedRecord;
use std::fmt::Write as _;
use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Everything the report needs about a finished run.
#[derive(Clone, Debug)]
pub struct RunReport {
    pub context: RunContext,
    pub roster_size: usize,
    pub enriched_records: usize,
    pub enrichment_failures: usize,
    pub execution: ExecutionReport,
}

impl RunReport {
    pub fn cluster_count(&self, origin: ClusterOrigin) -> usize {
        self.execution
            .clusters
            .iter()
            .filter(|c| c.decision.origin == origin)
            .count()
    }

    /// True when enough enrichment lookups failed that the run's defaults dominate its decisions.
    pub fn is_untrustworthy(&self) -> bool {
        if self.enriched_records == 0 {
            return false;
        }
        let ratio = self.enrichment_failures as f64 / self.enriched_records as f64;
        ratio >= UNTRUSTWORTHY_FAILURE_RATIO
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_header(&mut out);
        self.render_clusters(&mut out);
        self.render_summary(&mut out);
        out
    }

    /// Render and write the report to `path`, replacing any previous report.
    ///
    /// # Errors
    ///
    /// Returns `DedupError::ReportWrite` if the file cannot be written.
    pub fn write_to(&self, path: &Path) -> DedupResult<()> {
        ReportFile::create(path)?.write(self)
    }

    fn render_header(&self, out: &mut String) {
        let ctx = &self.context;
        let _ = writeln!(out, "# Duplicate merge report\n");
        let _ = writeln!(out, "**Run ID:** {}  ", ctx.run_id);
        let _ = writeln!(out, "**Timestamp:** {}  ", ctx.started_at.to_rfc3339());
        let _ = writeln!(out, "**Mode:** {}  ", ctx.mode);
        let _ = writeln!(out, "**Policy:** {}  ", ctx.policy);
        let _ = writeln!(out, "**Roster size:** {}  ", self.roster_size);
        let _ = writeln!(
            out,
            "**Clusters:** {} ({} name+dob, {} email)  ",
            self.execution.clusters.len(),
            self.cluster_count(ClusterOrigin::NameAndDob),
            self.cluster_count(ClusterOrigin::Email)
        );
        let _ = writeln!(
            out,
            "**Enrichment failures:** {} of {} records\n",
            self.enrichment_failures, self.enriched_records
        );

        if self.enrichment_failures > 0 {
            let _ = writeln!(
                out,
                "> **Warning:** enrichment failed for {} record(s). Those records were treated as \
                 inactive, ungrouped and unlinked, so no action was taken on them.",
                self.enrichment_failures
            );
            if self.is_untrustworthy() {
                let _ = writeln!(
                    out,
                    "> The failure rate is high enough that this run should not be trusted as a \
                     preview. Re-run once the EMR is reachable."
                );
            }
            out.push('\n');
        }
    }

    fn render_clusters(&self, out: &mut String) {
        let _ = writeln!(out, "## Clusters\n");
        if self.execution.clusters.is_empty() {
            let _ = writeln!(out, "No duplicate clusters found.\n");
            return;
        }

        for (index, cluster) in self.execution.clusters.iter().enumerate() {
            let decision = &cluster.decision;
            let _ = writeln!(
                out,
                "### {}. `{}` ({})\n",
                index + 1,
                decision.cluster_key,
                decision.origin
            );
            let _ = writeln!(
                out,
                "- **Master** `{}` {}: {}",
                decision.master_id(),
                decision.master.record.display_name(),
                signals(&decision.master)
            );
            for (candidate, outcome) in decision.candidates.iter().zip(&cluster.outcomes) {
                let _ = writeln!(
                    out,
                    "- `{}` {}: {} → **{}**",
                    candidate.record.id(),
                    candidate.record.record.display_name(),
                    signals(&candidate.record),
                    outcome_label(outcome)
                );
            }
            out.push('\n');
        }
    }

    fn render_summary(&self, out: &mut String) {
        let tally = &self.execution.tally;
        let _ = writeln!(out, "## Summary\n");
        let _ = writeln!(out, "| Outcome | Count |");
        let _ = writeln!(out, "| --- | --- |");
        let rows = [
            ("Clusters processed", tally.clusters_processed),
            ("Archived", tally.archived),
            ("Would archive", tally.would_archive),
            ("Archive failures", tally.archive_failed),
            ("Skipped: payment linked", tally.skipped_payment_linked),
            ("Skipped: group conflict", tally.skipped_group_conflict),
            ("Already inactive", tally.already_inactive),
        ];
        for (label, count) in rows {
            let _ = writeln!(out, "| {} | {} |", label, count);
        }
        if tally.audit_failures > 0 {
            let _ = writeln!(out, "| Audit write failures | {} |", tally.audit_failures);
        }
    }
}

/// Report destination, created before the run so an unwritable path fails as a setup error.
#[derive(Debug)]
pub struct ReportFile {
    path: PathBuf,
    file: File,
}

impl ReportFile {
    /// Create `path`, truncating any previous report.
    ///
    /// # Errors
    ///
    /// Returns `DedupError::ReportWrite` if the file cannot be created.
    pub fn create(path: &Path) -> DedupResult<Self> {
        let file = File::create(path).map_err(DedupError::ReportWrite)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(mut self, report: &RunReport) -> DedupResult<()> {
        self.file
            .write_all(report.render().as_bytes())
            .map_err(DedupError::ReportWrite)?;
        self.file.flush().map_err(DedupError::ReportWrite)?;
        tracing::info!("Wrote merge report to {}", self.path.display());
        Ok(())
    }
}

fn signals(member: &EnrichedRecord) -> String {
    let attrs = &member.enrichment;
    if let Some(error) = &attrs.enrichment_error {
        return format!("enrichment failed ({})", error);
    }
    format!(
        "active={} group={} payment={} richness={} created={}",
        attrs.is_active,
        attrs.has_group,
        attrs.payment_link_id.as_deref().unwrap_or("none"),
        attrs.richness_score(),
        member.record.created_at().format("%Y-%m-%d")
    )
}

fn outcome_label(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Archived => "archived".to_string(),
        Outcome::WouldArchive => "would archive".to_string(),
        Outcome::ArchiveFailed(error) => format!("archive failed: {}", error),
        Outcome::Skipped(disposition) => disposition.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::RunMode;
    use crate::decision::{CandidateDecision, MergeDecision};
    use crate::executor::{ClusterExecution, RunTally};
    use crate::record::{CandidateRecord, EnrichmentAttributes};
    use crate::safety::{Disposition, SafetyPolicy};
    use crate::scoring::RankKey;
    use chrono::{TimeZone, Utc};
    use emr_client::RichnessDetails;
    use std::fs;
    use tempfile::TempDir;

    fn member(id: &str, first: &str, payment: Option<&str>) -> EnrichedRecord {
        EnrichedRecord {
            record: CandidateRecord::new(
                id,
                first,
                "Smith",
                None,
                Some("1980-01-01".into()),
                Utc.with_ymd_and_hms(2019, 3, 4, 0, 0, 0).unwrap(),
            ),
            enrichment: EnrichmentAttributes {
                is_active: true,
                has_group: false,
                payment_link_id: payment.map(str::to_string),
                data_richness: RichnessDetails::default(),
                enrichment_error: None,
            },
        }
    }

    fn report(failures: usize) -> RunReport {
        let master = member("m", "Gregory", None);
        let candidate = member("c", "Greg", None);
        let decision = MergeDecision {
            cluster_key: "smith|gregory|1980-01-01".into(),
            origin: ClusterOrigin::NameAndDob,
            master_rank: RankKey::new(&master, 0, SafetyPolicy::ActiveOnly),
            master,
            candidates: vec![CandidateDecision {
                rank: RankKey::new(&candidate, 1, SafetyPolicy::ActiveOnly),
                record: candidate,
                disposition: Disposition::Retire,
            }],
        };
        RunReport {
            context: RunContext::new(RunMode::DryRun, SafetyPolicy::ActiveOnly),
            roster_size: 5,
            enriched_records: 2,
            enrichment_failures: failures,
            execution: ExecutionReport {
                mode: RunMode::DryRun,
                clusters: vec![ClusterExecution {
                    decision,
                    outcomes: vec![Outcome::WouldArchive],
                }],
                decision_log: vec![],
                tally: RunTally {
                    clusters_processed: 1,
                    would_archive: 1,
                    ..Default::default()
                },
            },
        }
    }

    #[test]
    fn test_render_contains_metadata_clusters_and_summary() {
        let rendered = report(0).render();
        assert!(rendered.contains("**Mode:** dry-run"));
        assert!(rendered.contains("**Policy:** active-only"));
        assert!(rendered.contains("**Roster size:** 5"));
        assert!(rendered.contains("**Clusters:** 1 (1 name+dob, 0 email)"));
        assert!(rendered.contains("- **Master** `m` Gregory Smith"));
        assert!(rendered.contains("- `c` Greg Smith"));
        assert!(rendered.contains("**would archive**"));
        assert!(rendered.contains("| Would archive | 1 |"));
        assert!(!rendered.contains("Warning"));
    }

    #[test]
    fn test_enrichment_failures_add_warning_banner() {
        let rendered = report(1).render();
        assert!(rendered.contains("> **Warning:** enrichment failed for 1 record(s)"));
        assert!(rendered.contains("should not be trusted"));
    }

    #[test]
    fn test_untrustworthy_threshold() {
        let mut report = report(0);
        report.enriched_records = 100;
        report.enrichment_failures = 9;
        assert!(!report.is_untrustworthy());
        report.enrichment_failures = 10;
        assert!(report.is_untrustworthy());
    }

    #[test]
    fn test_write_to_overwrites_previous_report() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("report.md");
        fs::write(&path, "stale").expect("should seed file");

        report(0).write_to(&path).expect("write should succeed");
        let contents = fs::read_to_string(&path).expect("should read report");
        assert!(contents.starts_with("# Duplicate merge report"));
        assert!(!contents.contains("stale"));
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("missing").join("report.md");
        assert!(matches!(
            report(0).write_to(&path),
            Err(DedupError::ReportWrite(_))
        ));
    }

    #[test]
    fn test_report_file_truncates_at_creation() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("report.md");
        fs::write(&path, "previous run").expect("should seed file");

        let file = ReportFile::create(&path).expect("create should succeed");
        assert_eq!(file.path(), path.as_path());
        assert_eq!(fs::read_to_string(&path).expect("should read report"), "");

        file.write(&report(0)).expect("write should succeed");
        let contents = fs::read_to_string(&path).expect("should read report");
        assert!(contents.starts_with("# Duplicate merge report"));
    }

    #[test]
    fn test_report_file_in_missing_directory_fails_at_creation() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("missing").join("report.md");
        assert!(matches!(
            ReportFile::create(&path),
            Err(DedupError::ReportWrite(_))
        ));
    }
}
