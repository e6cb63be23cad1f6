#[derive(Debug, thiserror::Error)]
pub enum DedupError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to read roster: {0}")]
    RosterRead(std::io::Error),
    #[error("failed to parse roster: {0}")]
    RosterParse(serde_json::Error),
    #[error("duplicate external identifier in roster snapshot: {0}")]
    DuplicateRosterId(String),
    #[error("failed to read config file: {0}")]
    ConfigRead(std::io::Error),
    #[error("failed to parse config file: {0}")]
    ConfigParse(serde_yaml::Error),
    #[error("unknown safety policy: {0}")]
    UnknownPolicy(String),
    #[error("failed to write report: {0}")]
    ReportWrite(std::io::Error),
    #[error("failed to write audit log: {0}")]
    AuditWrite(std::io::Error),
    #[error("failed to serialize audit event: {0}")]
    AuditSerialization(serde_json::Error),

    #[error("EMR error: {0}")]
    Emr(#[from] emr_client::EmrError),
}

pub type DedupResult<T> = std::result::Result<T, DedupError>;
