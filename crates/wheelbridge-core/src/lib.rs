//! wheelbridge engine: turns named PyPI requirements into conda repodata
//! documents and materializes individual `.conda` packages on demand from
//! the matching wheels.
//!
//! The crate is organized leaf-first: [`tags`] is the pure compatibility
//! matcher, [`client`] and [`cache`] form the memoized upstream fetch layer,
//! [`resolver`] drives breadth-first requirement resolution on top of them,
//! and [`materialize`] handles download, integrity verification, and
//! conversion of resolved artifacts. The HTTP-serving shell and the
//! wheel-to-conda byte converter live outside this crate; the converter is
//! abstracted as [`materialize::WheelConverter`].

pub mod cache;
pub mod client;
pub mod error;
pub mod materialize;
pub mod metadata;
pub mod resolver;
pub mod tags;

pub use client::PypiClient;
pub use error::{Error, Result};
pub use materialize::{ArtifactStore, WheelConverter};
pub use resolver::Resolver;
pub use tags::SystemLowerBounds;

/// User Agent string for upstream requests
pub const USER_AGENT: &str = concat!("wheelbridge/", env!("CARGO_PKG_VERSION"));
