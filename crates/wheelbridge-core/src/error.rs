//! Engine error taxonomy.

/// Errors surfaced by the engine.
///
/// Only [`Error::IntegrityMismatch`] is recovered from internally (the
/// materializer treats a corrupted candidate as absent and moves on);
/// everything else propagates to the caller. A resolution call never returns
/// a partial index document: it either completes or fails with one of these.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The upstream release-index or metadata fetch failed or timed out.
    /// Not retried automatically.
    #[error("Upstream index unavailable: {0}")]
    UpstreamUnavailable(#[from] reqwest::Error),

    /// A wheel tag's platform segment maps to no known subdir family. This
    /// indicates an unhandled packaging scheme, distinct from an ordinary
    /// "no match".
    #[error("Unknown platform tag: {0}")]
    UnknownPlatformTag(String),

    /// A downloaded artifact's digest disagrees with the digest declared at
    /// resolution time.
    #[error("Integrity mismatch: expected sha256 {expected}, got {actual}")]
    IntegrityMismatch {
        /// Digest the upstream index declared.
        expected: String,
        /// Digest of the bytes actually downloaded.
        actual: String,
    },

    /// No record exists for a requested filename, or every candidate failed
    /// integrity verification. A definitive negative, not an internal error.
    #[error("Package not found: {0}")]
    NotFound(String),

    /// The external wheel conversion routine rejected its input.
    #[error("Conversion failed for {filename}: {reason}")]
    ConversionFailure {
        /// Generated filename that was being materialized.
        filename: String,
        /// Converter-reported reason.
        reason: String,
    },

    /// An input requirement string could not be parsed.
    #[error(transparent)]
    InvalidRequirement(#[from] wheelbridge_schema::RequirementError),

    /// The upstream payload was syntactically valid JSON/metadata but not
    /// usable (bad version string, malformed wheel filename, ...).
    #[error("Invalid upstream metadata: {0}")]
    InvalidMetadata(String),

    /// Local filesystem failure in the artifact store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
