//! Breadth-first requirement resolution.
//!
//! Seeded with the caller's requirement strings, the resolver walks the
//! dependency graph in rounds: each round dispatches a bounded batch of
//! release-list fetches concurrently, selects compatible wheels per
//! requirement, builds repodata records from their metadata, and enqueues
//! newly discovered dependency names for the next round. A name resolved
//! once is never re-queued, which guarantees termination on cyclic graphs.
//! Any fetch failure inside a round aborts the whole call; no partial
//! repodata is ever returned.

use crate::cache::CoalescedCache;
use crate::client::PypiClient;
use crate::error::{Error, Result};
use crate::metadata::WheelMetadata;
use crate::tags::{parse_tag, platform_tag_to_subdir, tags_match, SystemLowerBounds};
use dashmap::DashMap;
use pep440_rs::Version;
use std::collections::{HashSet, VecDeque};
use std::str::FromStr;
use std::sync::Arc;
use wheelbridge_schema::{
    PackageName, PackageRecord, ReleaseFile, RepodataSet, Requirement, Subdir,
};

/// Nominal cap on accepted releases per package. The walk checks the cap
/// before processing each release, so one release beyond the nominal cap can
/// still contribute; tests pin this boundary deliberately.
pub const MAX_RELEASES_PER_PACKAGE: usize = 5;

/// Maximum requirements dispatched concurrently per resolution round.
pub const MAX_IN_FLIGHT: usize = 10;

/// Capacity of the per-package release-list cache.
pub const RELEASES_CACHE_CAPACITY: usize = 256;

/// Capacity of the per-wheel metadata cache.
pub const METADATA_CACHE_CAPACITY: usize = 1024;

/// Release list for one package, sorted by version descending.
type SortedReleases = Vec<(Version, String, Vec<ReleaseFile>)>;

/// Normalized identity of one resolution request: the ordered, deduplicated
/// requirement strings plus target subdir and Python version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepodataKey {
    requirements: Vec<String>,
    subdir: Subdir,
    python_version: String,
}

impl RepodataKey {
    fn new(requirements: &[String], subdir: Subdir, python_version: &str) -> Self {
        let mut requirements = requirements.to_vec();
        requirements.sort();
        requirements.dedup();
        Self {
            requirements,
            subdir,
            python_version: python_version.to_string(),
        }
    }
}

/// The resolution engine plus its three cache tiers.
///
/// The two fetch caches are bounded and coalescing; the top-level repodata
/// cache is unbounded and never evicted, so a repeated request returns the
/// previously computed documents unchanged even if upstream data has since
/// changed. Callers wanting fresh data must use
/// [`Resolver::resolve_fresh`] — this engine deliberately provides no other
/// freshness signal.
#[derive(Debug)]
pub struct Resolver {
    client: PypiClient,
    bounds: SystemLowerBounds,
    releases: CoalescedCache<PackageName, Arc<SortedReleases>>,
    metadata: CoalescedCache<String, Arc<WheelMetadata>>,
    repodata: DashMap<RepodataKey, Arc<RepodataSet>>,
}

impl Resolver {
    /// Create a resolver with default system lower bounds.
    pub fn new(client: PypiClient) -> Self {
        Self::with_bounds(client, SystemLowerBounds::default())
    }

    /// Create a resolver with explicit system lower bounds.
    pub fn with_bounds(client: PypiClient, bounds: SystemLowerBounds) -> Self {
        Self {
            client,
            bounds,
            releases: CoalescedCache::new(RELEASES_CACHE_CAPACITY),
            metadata: CoalescedCache::new(METADATA_CACHE_CAPACITY),
            repodata: DashMap::new(),
        }
    }

    /// Resolve `requirements` for the given target subdir and Python
    /// version, returning one repodata document per subdir (target plus
    /// noarch).
    ///
    /// A repeated request with the same normalized key is served from the
    /// top-level cache without touching upstream; the result may therefore
    /// be stale.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRequirement`] for unparseable inputs,
    /// [`Error::UpstreamUnavailable`] if any fetch in a round fails, or
    /// [`Error::UnknownPlatformTag`] from tag matching.
    pub async fn resolve(
        &self,
        requirements: &[String],
        target: Subdir,
        python_version: &str,
    ) -> Result<Arc<RepodataSet>> {
        let key = RepodataKey::new(requirements, target, python_version);
        if let Some(hit) = self.repodata.get(&key) {
            tracing::debug!(?key, "Repodata cache hit");
            return Ok(Arc::clone(hit.value()));
        }
        let set = Arc::new(
            self.resolve_uncached(requirements, target, python_version, false)
                .await?,
        );
        self.repodata.insert(key, Arc::clone(&set));
        Ok(set)
    }

    /// Like [`Resolver::resolve`], but recomputes from upstream: the
    /// top-level cache is bypassed and the fetch caches are refreshed with
    /// the newly downloaded data. The stored repodata entry is overwritten.
    ///
    /// # Errors
    ///
    /// Same as [`Resolver::resolve`].
    pub async fn resolve_fresh(
        &self,
        requirements: &[String],
        target: Subdir,
        python_version: &str,
    ) -> Result<Arc<RepodataSet>> {
        let key = RepodataKey::new(requirements, target, python_version);
        let set = Arc::new(
            self.resolve_uncached(requirements, target, python_version, true)
                .await?,
        );
        self.repodata.insert(key, Arc::clone(&set));
        Ok(set)
    }

    async fn resolve_uncached(
        &self,
        requirements: &[String],
        target: Subdir,
        python_version: &str,
        fresh: bool,
    ) -> Result<RepodataSet> {
        let mut repodatas = RepodataSet::new(target);
        let mut queue: VecDeque<Requirement> = requirements
            .iter()
            .map(|s| s.parse::<Requirement>())
            .collect::<std::result::Result<_, _>>()?;

        // The runtime's own package is implicit in every environment and is
        // never resolved against the upstream index.
        let mut seen: HashSet<PackageName> = HashSet::from([PackageName::new("python")]);
        let mut queued: HashSet<PackageName> = HashSet::new();

        while !queue.is_empty() {
            let take = queue.len().min(MAX_IN_FLIGHT);
            let batch: Vec<Requirement> = (0..take)
                .filter_map(|_| queue.pop_front())
                .filter(|req| !seen.contains(&req.name))
                .collect();

            let candidate_lists = futures::future::try_join_all(
                batch
                    .iter()
                    .map(|req| self.wheels_for_requirement(req, target, python_version, fresh)),
            )
            .await?;

            let mut record_futures = Vec::new();
            for (req, candidates) in batch.iter().zip(&candidate_lists) {
                for (version, file) in candidates {
                    record_futures.push(self.create_record(&req.name, version, file, fresh));
                }
            }
            let records = futures::future::try_join_all(record_futures).await?;

            for record in records {
                for dep in &record.depends {
                    match dep.parse::<Requirement>() {
                        Ok(dep_req) => {
                            if !seen.contains(&dep_req.name) && !queued.contains(&dep_req.name) {
                                queued.insert(dep_req.name.clone());
                                queue.push_back(dep_req);
                            }
                        }
                        Err(err) => {
                            tracing::warn!(dependency = %dep, %err, "Skipping unparseable dependency");
                        }
                    }
                }
                repodatas.insert(record);
            }

            seen.extend(batch.into_iter().map(|req| req.name));
        }

        Ok(repodatas)
    }

    /// Select the (version, wheel) candidates satisfying one requirement.
    ///
    /// Releases are walked newest first. A release only counts toward the
    /// cap if at least one of its wheels matched; a name-only requirement
    /// stops at the first release that yields a match.
    async fn wheels_for_requirement(
        &self,
        req: &Requirement,
        target: Subdir,
        python_version: &str,
        fresh: bool,
    ) -> Result<Vec<(String, ReleaseFile)>> {
        let releases = self.fetch_releases(&req.name, fresh).await?;
        let mut out = Vec::new();
        let mut release_count = 0usize;

        for (version, version_str, files) in releases.iter() {
            if release_count > MAX_RELEASES_PER_PACKAGE {
                break;
            }
            if !req.contains(version) {
                continue;
            }
            let mut bump_release_count = false;
            for file in files {
                if !file.is_wheel() {
                    continue;
                }
                let Some(stem) = file.wheel_stem() else {
                    continue;
                };
                let Some(tag_str) = tag_segment(stem) else {
                    continue;
                };
                if tags_match(tag_str, target, python_version, &self.bounds)? {
                    out.push((version_str.clone(), file.clone()));
                    bump_release_count = true;
                }
            }
            if bump_release_count {
                release_count += 1;
                if req.is_unconstrained() {
                    // Name-only request, assume latest wanted.
                    break;
                }
            }
        }
        Ok(out)
    }

    /// Build the repodata record for one matched wheel, fetching its core
    /// metadata through the bounded cache.
    async fn create_record(
        &self,
        name: &PackageName,
        version: &str,
        file: &ReleaseFile,
        fresh: bool,
    ) -> Result<PackageRecord> {
        let stem = file
            .wheel_stem()
            .ok_or_else(|| Error::InvalidMetadata(format!("Not a wheel: {}", file.filename)))?;
        let tag_str = tag_segment(stem).ok_or_else(|| {
            Error::InvalidMetadata(format!("Malformed wheel filename: {}", file.filename))
        })?;

        let metadata = self.fetch_metadata(&file.url, fresh).await?;

        let mut subdir = None;
        let mut noarch = None;
        for tag in parse_tag(tag_str)? {
            if tag.platform == "any" {
                subdir = Some(Subdir::Noarch);
                noarch = Some("python".to_string());
            } else {
                subdir = Some(platform_tag_to_subdir(&tag.platform)?);
            }
        }
        let subdir = subdir.ok_or_else(|| {
            Error::InvalidMetadata(format!("Empty tag set in wheel filename: {}", file.filename))
        })?;

        let mut depends = vec![match &file.requires_python {
            Some(rp) => format!("python {rp}"),
            None => "python".to_string(),
        }];
        for raw in &metadata.requires_dist {
            match raw.parse::<Requirement>() {
                Ok(dep) if dep.has_qualifiers() => {
                    // Marker/extras edges are excluded by design; keep the
                    // omission observable.
                    tracing::debug!(requirement = %raw, "Dropping marker/extras-qualified dependency");
                }
                Ok(dep) => depends.push(dep.to_depends_string()),
                Err(err) => {
                    tracing::warn!(requirement = %raw, %err, "Skipping unparseable Requires-Dist entry");
                }
            }
        }

        Ok(PackageRecord {
            name: name.clone(),
            version: version.to_string(),
            build: PackageRecord::build_string(tag_str),
            build_number: 0,
            filename: PackageRecord::conda_filename(name, version, tag_str),
            subdir,
            noarch,
            depends,
            size: None,
            legacy_size: file.size,
            timestamp: file.timestamp_millis(),
            md5: None,
            legacy_md5: file.digests.md5.clone(),
            sha256: None,
            legacy_sha256: file.digests.sha256.clone(),
            url: file.url.clone(),
            license: metadata.license_summary(),
        })
    }

    /// Release list for `name`, sorted newest first, through the bounded
    /// coalescing cache. A fresh walk fetches upstream unconditionally and
    /// replaces the cached entry.
    async fn fetch_releases(&self, name: &PackageName, fresh: bool) -> Result<Arc<SortedReleases>> {
        if fresh {
            let releases = self.fetch_releases_upstream(name).await?;
            self.releases
                .put(name.clone(), Arc::clone(&releases))
                .await;
            return Ok(releases);
        }
        self.releases
            .get_or_fetch(name.clone(), || self.fetch_releases_upstream(name))
            .await
    }

    /// Versions that do not parse as PEP 440 are dropped with a warning
    /// rather than failing the whole package.
    async fn fetch_releases_upstream(&self, name: &PackageName) -> Result<Arc<SortedReleases>> {
        let project = self.client.fetch_releases(name).await?;
        let mut releases: SortedReleases = project
            .releases
            .into_iter()
            .filter_map(|(version_str, files)| match Version::from_str(&version_str) {
                Ok(version) => Some((version, version_str, files)),
                Err(err) => {
                    tracing::warn!(%name, %version_str, %err, "Dropping non-PEP 440 version");
                    None
                }
            })
            .collect();
        releases.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(Arc::new(releases))
    }

    /// Wheel core metadata for `url`, through the bounded coalescing cache.
    async fn fetch_metadata(&self, url: &str, fresh: bool) -> Result<Arc<WheelMetadata>> {
        if fresh {
            let metadata = Arc::new(self.client.fetch_wheel_metadata(url).await?);
            self.metadata
                .put(url.to_string(), Arc::clone(&metadata))
                .await;
            return Ok(metadata);
        }
        self.metadata
            .get_or_fetch(url.to_string(), || async {
                Ok(Arc::new(self.client.fetch_wheel_metadata(url).await?))
            })
            .await
    }
}

/// The `{python}-{abi}-{platform}` segment of a wheel filename stem: the
/// last three `-`-separated components.
fn tag_segment(stem: &str) -> Option<&str> {
    let mut idx = stem.len();
    for _ in 0..3 {
        idx = stem[..idx].rfind('-')?;
    }
    Some(&stem[idx + 1..])
}
