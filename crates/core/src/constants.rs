//! Constants used throughout the dedup core crate.
//!
//! Defaults for configuration, artefact paths and scoring weights live here so they stay
//! consistent between the config layer, the engine and the tests.

use std::time::Duration;

/// Default report artefact, relative to the working directory. Overwritten on each run.
pub const DEFAULT_REPORT_PATH: &str = "duplicate-merge-report.md";

/// Default append-only audit log, relative to the working directory.
pub const DEFAULT_AUDIT_LOG_PATH: &str = "duplicate-merge-audit.jsonl";

/// Default roster export, relative to the working directory.
pub const DEFAULT_ROSTER_PATH: &str = "roster.json";

/// Delay enforced between successive remote calls.
pub const DEFAULT_CALL_DELAY: Duration = Duration::from_millis(250);

/// Extra pause inserted after every `DEFAULT_BATCH_SIZE` clusters.
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_millis(5_000);

/// Number of clusters between long pauses.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Email domains the EMR uses for auto-generated, non-contactable addresses.
pub const DEFAULT_PLACEHOLDER_DOMAINS: &[&str] = &["placeholder-domain.example"];

/// Metadata keys that may hold a payment-processor customer reference.
pub const DEFAULT_PAYMENT_METADATA_KEYS: &[&str] = &[
    "stripe_customer_id",
    "stripeCustomerId",
    "stripe_customer",
    "payment_customer_id",
];

/// Name tokens dropped during normalisation (honorifics and generational suffixes).
pub const NAME_AFFIXES: &[&str] = &[
    "mr", "mrs", "ms", "miss", "dr", "prof", "jr", "sr", "ii", "iii", "iv",
];

/// Edit distance below which two names are considered similar.
pub const MAX_NAME_EDIT_DISTANCE: usize = 3;

/// Names must be longer than this for the edit-distance rule to apply.
pub const MIN_FUZZY_NAME_LEN: usize = 3;

/// Weight of each document in the data richness score.
pub const DOCUMENT_WEIGHT: u64 = 5;
/// Weight of each completed form in the data richness score.
pub const FORM_WEIGHT: u64 = 3;
/// Weight of each medication, allergy or prescription entry in the data richness score.
pub const CLINICAL_ENTRY_WEIGHT: u64 = 1;

/// Enrichment failure rate above which a run is flagged as untrustworthy in the report.
pub const UNTRUSTWORTHY_FAILURE_RATIO: f64 = 0.1;
