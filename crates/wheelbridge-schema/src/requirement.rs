//! Dependency requirement strings (`name[extras] specifiers ; marker`).

use crate::name::PackageName;
use pep440_rs::{Version, VersionSpecifiers};
use std::str::FromStr;

/// Errors that can occur when parsing a [`Requirement`] string.
#[derive(thiserror::Error, Debug)]
pub enum RequirementError {
    /// The requirement string is empty or starts with something other than a
    /// package name.
    #[error("Requirement has no package name: '{0}'")]
    MissingName(String),

    /// The extras bracket is opened but never closed.
    #[error("Unterminated extras bracket in '{0}'")]
    UnterminatedExtras(String),

    /// The version constraint portion is not a valid PEP 440 specifier set.
    #[error("Invalid version specifiers in '{input}': {source}")]
    InvalidSpecifiers {
        /// The offending requirement string.
        input: String,
        /// The underlying PEP 440 parse failure.
        source: pep440_rs::VersionSpecifiersParseError,
    },
}

/// A parsed dependency requirement: `name[extras] specifiers ; marker`.
///
/// Covers the subset of PEP 508 the engine consumes. Markers are captured
/// verbatim but never evaluated; the resolver drops any requirement that
/// carries markers or extras (see [`Requirement::has_qualifiers`]) and logs
/// the omission. URL requirements (`name @ https://...`) parse as
/// unconstrained; the URL itself is discarded.
///
/// # Example
///
/// ```
/// use wheelbridge_schema::Requirement;
///
/// let req: Requirement = "charset_normalizer (<4,>=2)".parse().unwrap();
/// assert_eq!(req.name.as_str(), "charset-normalizer");
/// assert!(req.specifiers.is_some());
/// assert!(!req.has_qualifiers());
/// ```
#[derive(Debug, Clone)]
pub struct Requirement {
    /// Normalized package name.
    pub name: PackageName,
    /// Optional extras, e.g. `[socks]`. Presence disqualifies the edge.
    pub extras: Vec<String>,
    /// Optional PEP 440 version constraint set.
    pub specifiers: Option<VersionSpecifiers>,
    /// Optional environment marker, verbatim. Presence disqualifies the edge.
    pub marker: Option<String>,
}

impl Requirement {
    /// Whether this requirement carries an environment marker or extras.
    ///
    /// Such edges are excluded from dependency discovery, a documented
    /// limitation of the engine rather than a silent bug.
    pub fn has_qualifiers(&self) -> bool {
        self.marker.is_some() || !self.extras.is_empty()
    }

    /// Whether `version` satisfies this requirement's constraint.
    ///
    /// A requirement without specifiers accepts every version.
    pub fn contains(&self, version: &Version) -> bool {
        match &self.specifiers {
            Some(specs) => specs.contains(version),
            None => true,
        }
    }

    /// Whether this is a name-only ("latest wanted") requirement.
    pub fn is_unconstrained(&self) -> bool {
        self.specifiers.is_none()
    }

    /// Render as a conda dependency string: `name specifiers` (name only if
    /// unconstrained).
    pub fn to_depends_string(&self) -> String {
        match &self.specifiers {
            Some(specs) => format!("{} {specs}", self.name),
            None => self.name.to_string(),
        }
    }
}

impl FromStr for Requirement {
    type Err = RequirementError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        // Split off the environment marker first; markers may contain any
        // character except another top-level ';' we care about.
        let (head, marker) = match input.split_once(';') {
            Some((head, marker)) => (head, Some(marker.trim().to_string())),
            None => (input, None),
        };
        let marker = marker.filter(|m| !m.is_empty());

        let head = head.trim();
        let name_end = head
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(head.len());
        if name_end == 0 {
            return Err(RequirementError::MissingName(input.to_string()));
        }
        let name = PackageName::new(&head[..name_end]);
        let mut rest = head[name_end..].trim_start();

        let mut extras = Vec::new();
        if let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped
                .find(']')
                .ok_or_else(|| RequirementError::UnterminatedExtras(input.to_string()))?;
            extras = stripped[..close]
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            rest = stripped[close + 1..].trim_start();
        }

        // URL requirements (`name @ https://...`) carry no version
        // constraint; the URL itself is not consumed by the engine.
        if rest.starts_with('@') {
            return Ok(Self {
                name,
                extras,
                specifiers: None,
                marker,
            });
        }

        // Specifiers are optionally parenthesized: `requests (>=2.0)`.
        let spec_str = rest
            .trim()
            .trim_start_matches('(')
            .trim_end_matches(')')
            .trim();
        let specifiers = if spec_str.is_empty() {
            None
        } else {
            Some(VersionSpecifiers::from_str(spec_str).map_err(|source| {
                RequirementError::InvalidSpecifiers {
                    input: input.to_string(),
                    source,
                }
            })?)
        };

        Ok(Self {
            name,
            extras,
            specifiers,
            marker,
        })
    }
}

impl std::fmt::Display for Requirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if let Some(specs) = &self.specifiers {
            write!(f, "{specs}")?;
        }
        if let Some(marker) = &self.marker {
            write!(f, "; {marker}")?;
        }
        Ok(())
    }
}
