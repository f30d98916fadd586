/// Exceptional, non-taxonomy failures.
///
/// This is deliberately small: the banded failure classes a scan can reach
/// for a given domain (`DNS_*`, the various `*_INCONSISTENT`/`NO_CDS`/
/// `NO_CDNSKEY`/`CONTINUITY_ERR` cases, and the benign no-ops) are modeled
/// as [`crate::events::Event`]s, not as `Result::Err` — a scan never
/// propagates an error past its own boundary. `ScanError` exists only for
/// genuinely exceptional conditions: malformed configuration, a name that
/// cannot be built, an I/O error opening a job file.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("invalid domain name: {0}")]
    Name(#[from] hickory_proto::rr::domain::Error),

    #[error("could not construct signaling name: {0}")]
    Signaling(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
