//! # Dedup Core
//!
//! Patient record deduplication and merge-resolution engine.
//!
//! This crate detects duplicate patient identities in a roster snapshot, decides which duplicate
//! is authoritative and retires the others in the external EMR:
//! - Normalisation and name similarity (pure functions)
//! - Cluster building over the roster (pure, no remote calls)
//! - Rate-limited enrichment of cluster members from the EMR
//! - Deterministic master selection and a named safety policy
//! - Merge execution in dry-run or execute mode, with an append-only audit log
//! - A markdown report per run
//!
//! "Merge" always means designate one master and deactivate the rest. Nothing is ever deleted.
//!
//! **No process concerns**: credentials, argument parsing and the tracing subscriber belong in the
//! `dedup-run` binary.

pub mod audit;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod decision;
pub mod enrich;
pub mod error;
pub mod executor;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod roster;
pub mod safety;
pub mod scoring;
pub mod similarity;
pub mod throttle;

pub use audit::{AuditEvent, AuditLog, RunContext, RunMode};
pub use cluster::{build_clusters, ClusterOrigin, DuplicateCluster};
pub use config::{load_config_file, ConfigFile, DedupConfig};
pub use decision::{decide, CandidateDecision, MergeDecision};
pub use enrich::{EnrichedCluster, Enricher};
pub use error::{DedupError, DedupResult};
pub use executor::{
    ClusterExecution, ExecutionReport, LiveMutator, MergeExecutor, MutationEffect, Mutator,
    NoopMutator, Outcome, RunTally,
};
pub use normalize::{normalize_email, normalize_name};
pub use pipeline::DedupEngine;
pub use record::{CandidateRecord, EnrichedRecord, EnrichmentAttributes};
pub use report::{ReportFile, RunReport};
pub use roster::{InMemoryRosterSource, JsonRosterSource, RosterSource};
pub use safety::{Disposition, SafetyGate, SafetyPolicy};
pub use scoring::{rank_members, RankKey, RankedMember};
pub use similarity::names_similar;
pub use throttle::{FixedIntervalThrottle, NoopThrottle, Throttle};
