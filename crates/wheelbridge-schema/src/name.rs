//! Normalized package-name identity.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;

/// A PEP 503-normalized package name.
///
/// PyPI treats `Flask`, `flask` and `charset_normalizer` /
/// `charset-normalizer` as the same project; every run of `-`, `_` and `.`
/// collapses to a single `-` and the result is lowercased. All identity
/// comparisons in the engine (seen-sets, cache keys, queue dedup) go through
/// this type.
///
/// # Example
///
/// ```
/// use wheelbridge_schema::PackageName;
///
/// let name = PackageName::new("Charset__Normalizer");
/// assert_eq!(name.as_str(), "charset-normalizer");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Create a normalized name from any spelling of a PyPI project name.
    pub fn new(raw: &str) -> Self {
        let mut out = String::with_capacity(raw.len());
        let mut prev_sep = false;
        for ch in raw.trim().chars() {
            if matches!(ch, '-' | '_' | '.') {
                if !prev_sep {
                    out.push('-');
                }
                prev_sep = true;
            } else {
                out.push(ch.to_ascii_lowercase());
                prev_sep = false;
            }
        }
        Self(out)
    }

    /// The normalized name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(PackageName::new("Flask").as_str(), "flask");
        assert_eq!(PackageName::new("typing_extensions").as_str(), "typing-extensions");
        assert_eq!(PackageName::new("ruamel.yaml").as_str(), "ruamel-yaml");
        assert_eq!(PackageName::new("a--_.b").as_str(), "a-b");
    }

    #[test]
    fn test_identity_is_normalized() {
        assert_eq!(PackageName::new("Charset_Normalizer"), PackageName::new("charset-normalizer"));
    }
}
