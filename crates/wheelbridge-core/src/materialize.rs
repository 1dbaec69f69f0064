//! On-demand artifact materialization: download the source wheel, verify its
//! digest against what the index declared at resolution time, and hand it to
//! the external converter to produce the `.conda` file.
//!
//! Concurrent requests for the same not-yet-cached filename are serialized
//! through a per-filename guard, so at most one download+conversion runs per
//! filename; later waiters find the finished file on disk. Integrity
//! failures are recoverable per candidate: the corrupt staging file is
//! removed, nothing negative is cached, and the next candidate (or a later
//! retry) starts from scratch.

use crate::error::{Error, Result};
use dashmap::DashMap;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use wheelbridge_schema::{PackageRecord, RepodataSet};

/// The external wheel-to-conda conversion routine.
///
/// Implementations convert the wheel at `wheel_path` into a `.conda` package
/// named `output_filename` inside `out_dir`, and fail on malformed input.
/// The routine is trusted to be correct; this crate only decides when to
/// invoke it.
pub trait WheelConverter: Send + Sync {
    /// Convert `wheel_path` into `out_dir/output_filename`.
    ///
    /// # Errors
    ///
    /// Returns a converter-specific error on malformed input; the store maps
    /// it to [`Error::ConversionFailure`] and does not retry.
    fn convert(
        &self,
        wheel_path: &Path,
        out_dir: &Path,
        output_filename: &str,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Local store of materialized `.conda` files, addressed by generated
/// filename.
pub struct ArtifactStore {
    dir: PathBuf,
    client: reqwest::Client,
    converter: Arc<dyn WheelConverter>,
    // One guard per filename; entries live for the process lifetime, like
    // the repodata cache above this layer.
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("dir", &self.dir)
            .field("in_flight", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}

impl ArtifactStore {
    /// Create a store rooted at `dir`, which is created if absent.
    ///
    /// # Errors
    ///
    /// [`Error::Io`] if the directory cannot be created.
    pub fn new(
        dir: impl Into<PathBuf>,
        client: reqwest::Client,
        converter: Arc<dyn WheelConverter>,
    ) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            client,
            converter,
            in_flight: DashMap::new(),
        })
    }

    /// Path a materialized `filename` will occupy.
    pub fn artifact_path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Resolve `filename` to a local `.conda` file, fetching and converting
    /// the source wheel if it is not already on disk.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if no record carries this filename or every
    /// candidate failed integrity verification;
    /// [`Error::UpstreamUnavailable`] on download failure;
    /// [`Error::ConversionFailure`] if the converter rejects the wheel.
    pub async fn materialize(&self, filename: &str, repodata: &RepodataSet) -> Result<PathBuf> {
        let out_path = self.artifact_path(filename);

        let guard = self
            .in_flight
            .entry(filename.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _lock = guard.lock().await;

        if tokio::fs::try_exists(&out_path).await? {
            return Ok(out_path);
        }

        let mut found_any = false;
        for record in repodata.find_all(filename) {
            found_any = true;
            match self.fetch_and_convert(record, filename).await {
                Ok(()) => return Ok(out_path),
                Err(Error::IntegrityMismatch { expected, actual }) => {
                    tracing::warn!(
                        %filename,
                        %expected,
                        %actual,
                        "Discarding candidate with mismatching digest"
                    );
                }
                Err(err) => return Err(err),
            }
        }

        if found_any {
            tracing::warn!(%filename, "All candidates failed integrity verification");
        }
        Err(Error::NotFound(filename.to_string()))
    }

    /// Download the record's wheel to a staging path, verify its SHA-256
    /// against the declared digest, and convert it.
    async fn fetch_and_convert(&self, record: &PackageRecord, filename: &str) -> Result<()> {
        let wheel_name = record.url.rsplit('/').next().unwrap_or("staging.whl");
        let staging = self.dir.join(wheel_name);

        let response = self
            .client
            .get(&record.url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(&staging).await?;
        let mut stream = response.bytes_stream();
        let mut hasher = Sha256::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
        }
        file.flush().await?;

        let actual = hex::encode(hasher.finalize());
        if actual != record.legacy_sha256 {
            tokio::fs::remove_file(&staging).await.ok();
            return Err(Error::IntegrityMismatch {
                expected: record.legacy_sha256.clone(),
                actual,
            });
        }

        self.converter
            .convert(&staging, &self.dir, filename)
            .map_err(|err| Error::ConversionFailure {
                filename: filename.to_string(),
                reason: err.to_string(),
            })
    }
}
