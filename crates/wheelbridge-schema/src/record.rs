//! The emitted conda index documents (`repodata.json`) and their records.
//!
//! Field set and null/legacy duality mirror what conda expects for packages
//! that have not been converted yet: the native `size`/`md5`/`sha256` slots
//! are serialized as JSON `null`, while the `legacy_*` fields carry the
//! values PyPI declared for the source wheel.

use crate::name::PackageName;
use crate::platform::Subdir;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One resolved, not-yet-converted package in the target schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Normalized package name.
    pub name: PackageName,
    /// Version string as published upstream.
    pub version: String,
    /// Build string, derived deterministically from the wheel tag.
    pub build: String,
    /// Build number, always 0.
    pub build_number: u32,
    /// Generated `.conda` filename.
    #[serde(rename = "fn")]
    pub filename: String,
    /// Subdirectory this record belongs to.
    pub subdir: Subdir,
    /// `"python"` for interpreter-independent (noarch) packages.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noarch: Option<String>,
    /// Dependency requirement strings, conda-style.
    pub depends: Vec<String>,
    /// Size of the converted artifact; null until conversion happens.
    pub size: Option<u64>,
    /// Size of the source wheel as declared by the upstream index.
    pub legacy_size: u64,
    /// Upload timestamp, milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// MD5 of the converted artifact; null until conversion happens.
    pub md5: Option<String>,
    /// MD5 of the source wheel as declared by the upstream index.
    pub legacy_md5: String,
    /// SHA-256 of the converted artifact; null until conversion happens.
    pub sha256: Option<String>,
    /// SHA-256 of the source wheel as declared by the upstream index.
    pub legacy_sha256: String,
    /// Download URL of the source wheel.
    pub url: String,
    /// License summary (SPDX expression or first line of the license field).
    pub license: String,
}

impl PackageRecord {
    /// Derive the build string for a wheel tag: lower-cased, `-` and `.`
    /// normalized to `_`, `pypi_` prefix, trailing revision counter `_0`.
    ///
    /// A pure function of the tag, so re-resolving the same wheel always
    /// produces the same build string.
    pub fn build_string(tag: &str) -> String {
        let normalized = tag.to_ascii_lowercase().replace(['-', '.'], "_");
        format!("pypi_{normalized}_0")
    }

    /// Derive the generated `.conda` filename for a (name, version, tag)
    /// triple: `{name}-{version}-{build_string}.conda`.
    pub fn conda_filename(name: &PackageName, version: &str, tag: &str) -> String {
        format!("{name}-{version}-{}.conda", Self::build_string(tag))
    }
}

/// The `info` block of a repodata document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdirInfo {
    /// Subdirectory this document describes.
    pub subdir: Subdir,
}

/// One repodata document: subdir metadata plus the two filename-to-record
/// maps, one per package container format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repodata {
    /// Subdirectory metadata.
    pub info: SubdirInfo,
    /// Legacy `.tar.bz2` container records. Always empty here: the engine
    /// only emits `.conda` filenames.
    pub packages: BTreeMap<String, PackageRecord>,
    /// `.conda` container records, keyed by generated filename.
    #[serde(rename = "packages.conda")]
    pub packages_conda: BTreeMap<String, PackageRecord>,
}

impl Repodata {
    /// An empty document for `subdir`.
    pub fn new(subdir: Subdir) -> Self {
        Self {
            info: SubdirInfo { subdir },
            packages: BTreeMap::new(),
            packages_conda: BTreeMap::new(),
        }
    }

    /// Look up a record by generated filename across both container maps.
    pub fn get(&self, filename: &str) -> Option<&PackageRecord> {
        self.packages_conda
            .get(filename)
            .or_else(|| self.packages.get(filename))
    }
}

/// A full resolution result: one repodata document per subdirectory (the
/// target platform plus `noarch`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepodataSet {
    /// Documents keyed by subdir.
    pub subdirs: HashMap<Subdir, Repodata>,
}

impl RepodataSet {
    /// Empty documents for `target` and `noarch`.
    pub fn new(target: Subdir) -> Self {
        let mut subdirs = HashMap::new();
        subdirs.insert(target, Repodata::new(target));
        subdirs.insert(Subdir::Noarch, Repodata::new(Subdir::Noarch));
        Self { subdirs }
    }

    /// The document for one subdir, if present.
    pub fn get(&self, subdir: Subdir) -> Option<&Repodata> {
        self.subdirs.get(&subdir)
    }

    /// Insert a record into its subdir's `.conda` map.
    pub fn insert(&mut self, record: PackageRecord) {
        self.subdirs
            .entry(record.subdir)
            .or_insert_with(|| Repodata::new(record.subdir))
            .packages_conda
            .insert(record.filename.clone(), record);
    }

    /// Look up a record by generated filename across all subdirs and both
    /// container maps.
    pub fn find(&self, filename: &str) -> Option<&PackageRecord> {
        self.subdirs.values().find_map(|doc| doc.get(filename))
    }

    /// All records stored under `filename`, across subdirs and both
    /// container maps. Usually zero or one, but a filename can in principle
    /// appear in several documents.
    pub fn find_all<'a>(&'a self, filename: &'a str) -> impl Iterator<Item = &'a PackageRecord> {
        self.subdirs.values().flat_map(move |doc| {
            doc.packages_conda
                .get(filename)
                .into_iter()
                .chain(doc.packages.get(filename))
        })
    }

    /// Iterate every `.conda` record across all subdirs.
    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.subdirs
            .values()
            .flat_map(|doc| doc.packages_conda.values())
    }
}
