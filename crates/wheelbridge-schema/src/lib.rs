//! Shared data model for wheelbridge: normalized package names, PyPI
//! requirement strings, target subdirs, the upstream (PyPI JSON API) wire
//! format, and the emitted conda repodata documents.
//!
//! This crate performs no I/O; everything here is parsing, validation, and
//! serde plumbing shared between the engine and its callers.

pub mod name;
pub mod platform;
pub mod pypi;
pub mod record;
pub mod requirement;

// Re-exports
pub use name::PackageName;
pub use platform::Subdir;
pub use pypi::{ProjectReleases, ReleaseFile};
pub use record::{PackageRecord, Repodata, RepodataSet, SubdirInfo};
pub use requirement::{Requirement, RequirementError};
