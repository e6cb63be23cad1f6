//! Engine configuration.
//!
//! Configuration is resolved once at process startup and then passed into the engine as
//! `Arc<DedupConfig>`. No component reads environment variables during a run.
//!
//! Sources, lowest precedence first: built-in defaults, an optional YAML file, command-line flags.
//! The file and the flags are both expressed as a [`ConfigFile`] and layered with
//! [`ConfigFile::overlay`] before [`DedupConfig::resolve`] fills the gaps and validates.

use crate::constants::{
    DEFAULT_AUDIT_LOG_PATH, DEFAULT_BATCH_PAUSE, DEFAULT_BATCH_SIZE, DEFAULT_CALL_DELAY,
    DEFAULT_PAYMENT_METADATA_KEYS, DEFAULT_PLACEHOLDER_DOMAINS, DEFAULT_REPORT_PATH,
    DEFAULT_ROSTER_PATH,
};
use crate::safety::SafetyPolicy;
use crate::{DedupError, DedupResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Partial configuration as read from YAML or assembled from flags. Every key is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub policy: Option<String>,
    pub call_delay_ms: Option<u64>,
    pub batch_pause_ms: Option<u64>,
    pub batch_size: Option<usize>,
    pub placeholder_domains: Option<Vec<String>>,
    pub payment_metadata_keys: Option<Vec<String>>,
    pub report_path: Option<PathBuf>,
    pub audit_log_path: Option<PathBuf>,
    pub roster_path: Option<PathBuf>,
}

impl ConfigFile {
    /// Layer `higher` on top of `self`; keys set in `higher` win.
    pub fn overlay(self, higher: ConfigFile) -> ConfigFile {
        ConfigFile {
            policy: higher.policy.or(self.policy),
            call_delay_ms: higher.call_delay_ms.or(self.call_delay_ms),
            batch_pause_ms: higher.batch_pause_ms.or(self.batch_pause_ms),
            batch_size: higher.batch_size.or(self.batch_size),
            placeholder_domains: higher.placeholder_domains.or(self.placeholder_domains),
            payment_metadata_keys: higher.payment_metadata_keys.or(self.payment_metadata_keys),
            report_path: higher.report_path.or(self.report_path),
            audit_log_path: higher.audit_log_path.or(self.audit_log_path),
            roster_path: higher.roster_path.or(self.roster_path),
        }
    }
}

/// Read a YAML configuration file.
///
/// # Errors
///
/// Returns `DedupError::ConfigRead` if the file cannot be read and `DedupError::ConfigParse` if it
/// is not valid YAML or contains unknown keys.
pub fn load_config_file(path: &Path) -> DedupResult<ConfigFile> {
    let contents = fs::read_to_string(path).map_err(DedupError::ConfigRead)?;
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&contents).map_err(DedupError::ConfigParse)
}

/// Fully resolved engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DedupConfig {
    policy: SafetyPolicy,
    call_delay: Duration,
    batch_pause: Duration,
    batch_size: usize,
    placeholder_domains: Vec<String>,
    payment_metadata_keys: Vec<String>,
    report_path: PathBuf,
    audit_log_path: PathBuf,
    roster_path: PathBuf,
}

impl DedupConfig {
    /// Fill unset keys from the built-in defaults and validate the result.
    ///
    /// # Errors
    ///
    /// - `DedupError::UnknownPolicy` for an unrecognised policy name.
    /// - `DedupError::InvalidInput` for a zero batch size, an empty payment key list or an empty
    ///   artefact path.
    pub fn resolve(file: ConfigFile) -> DedupResult<Self> {
        let policy = match file.policy.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.parse()?,
            _ => SafetyPolicy::default(),
        };

        let batch_size = file.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(DedupError::InvalidInput(
                "batch_size must be at least 1".into(),
            ));
        }

        let placeholder_domains = clean_list(
            file.placeholder_domains
                .unwrap_or_else(|| owned(DEFAULT_PLACEHOLDER_DOMAINS)),
        )
        .into_iter()
        .map(|domain| domain.to_lowercase())
        .collect();

        let payment_metadata_keys = clean_list(
            file.payment_metadata_keys
                .unwrap_or_else(|| owned(DEFAULT_PAYMENT_METADATA_KEYS)),
        );
        if payment_metadata_keys.is_empty() {
            return Err(DedupError::InvalidInput(
                "payment_metadata_keys cannot be empty".into(),
            ));
        }

        let report_path = non_empty_path(file.report_path, DEFAULT_REPORT_PATH, "report_path")?;
        let audit_log_path =
            non_empty_path(file.audit_log_path, DEFAULT_AUDIT_LOG_PATH, "audit_log_path")?;
        let roster_path = non_empty_path(file.roster_path, DEFAULT_ROSTER_PATH, "roster_path")?;

        Ok(Self {
            policy,
            call_delay: file
                .call_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_CALL_DELAY),
            batch_pause: file
                .batch_pause_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_BATCH_PAUSE),
            batch_size,
            placeholder_domains,
            payment_metadata_keys,
            report_path,
            audit_log_path,
            roster_path,
        })
    }

    pub fn policy(&self) -> SafetyPolicy {
        self.policy
    }

    pub fn call_delay(&self) -> Duration {
        self.call_delay
    }

    pub fn batch_pause(&self) -> Duration {
        self.batch_pause
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn placeholder_domains(&self) -> &[String] {
        &self.placeholder_domains
    }

    /// Metadata keys checked, in order, for a payment-processor reference.
    pub fn payment_metadata_keys(&self) -> &[String] {
        &self.payment_metadata_keys
    }

    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    pub fn audit_log_path(&self) -> &Path {
        &self.audit_log_path
    }

    pub fn roster_path(&self) -> &Path {
        &self.roster_path
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            policy: SafetyPolicy::default(),
            call_delay: DEFAULT_CALL_DELAY,
            batch_pause: DEFAULT_BATCH_PAUSE,
            batch_size: DEFAULT_BATCH_SIZE,
            placeholder_domains: owned(DEFAULT_PLACEHOLDER_DOMAINS),
            payment_metadata_keys: owned(DEFAULT_PAYMENT_METADATA_KEYS),
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            audit_log_path: PathBuf::from(DEFAULT_AUDIT_LOG_PATH),
            roster_path: PathBuf::from(DEFAULT_ROSTER_PATH),
        }
    }
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

fn non_empty_path(value: Option<PathBuf>, default: &str, key: &str) -> DedupResult<PathBuf> {
    let path = value.unwrap_or_else(|| PathBuf::from(default));
    if path.as_os_str().is_empty() {
        return Err(DedupError::InvalidInput(format!("{} cannot be empty", key)));
    }
    Ok(path)
}
