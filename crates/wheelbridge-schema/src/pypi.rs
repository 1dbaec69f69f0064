//! Wire format of the PyPI JSON API (`https://pypi.org/pypi/{name}/json`).
//!
//! Only the fields the engine consumes are modeled; everything else in the
//! upstream payload is ignored by serde.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The `releases` portion of a PyPI project document: version string to the
/// files published for that version.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectReleases {
    /// Mapping of version string to published files.
    pub releases: HashMap<String, Vec<ReleaseFile>>,
}

/// Content digests PyPI declares for one published file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Digests {
    /// Hex MD5 of the file as uploaded.
    pub md5: String,
    /// Hex SHA-256 of the file as uploaded.
    pub sha256: String,
}

/// One published artifact (wheel or sdist) of a release.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseFile {
    /// Artifact filename; for wheels this encodes the compatibility tags.
    pub filename: String,
    /// Download URL.
    pub url: String,
    /// Declared size in bytes.
    #[serde(default)]
    pub size: u64,
    /// Declared content digests.
    pub digests: Digests,
    /// Upload timestamp, ISO 8601 with offset.
    pub upload_time_iso_8601: String,
    /// Declared minimum-Python constraint (PEP 345 `Requires-Python`).
    #[serde(default)]
    pub requires_python: Option<String>,
}

impl ReleaseFile {
    /// Whether this file is a built wheel (as opposed to an sdist or other
    /// source-only artifact).
    #[allow(clippy::case_sensitive_file_extension_comparisons)] // index filenames are lowercase
    pub fn is_wheel(&self) -> bool {
        self.url.ends_with(".whl")
    }

    /// The filename with the `.whl` suffix stripped, or `None` for non-wheels.
    pub fn wheel_stem(&self) -> Option<&str> {
        self.filename.strip_suffix(".whl")
    }

    /// Upload time as milliseconds since the Unix epoch, or 0 if the
    /// timestamp does not parse.
    pub fn timestamp_millis(&self) -> i64 {
        chrono::DateTime::parse_from_rfc3339(&self.upload_time_iso_8601)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0)
    }
}
