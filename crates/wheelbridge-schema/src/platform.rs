//! Target platform subdirectories.

use serde::{Deserialize, Serialize};

/// A conda channel subdirectory: the platform-scoped partition of an index.
///
/// The engine supports the three 64-bit desktop platforms plus the universal
/// `noarch` bucket. Wheels carrying platform tags outside these families are
/// rejected at tag-matching time with a hard error, because they indicate a
/// packaging scheme the subdir mapping does not cover.
///
/// # Example
///
/// ```
/// use wheelbridge_schema::Subdir;
///
/// let subdir: Subdir = "linux-64".parse().unwrap();
/// assert_eq!(subdir.as_str(), "linux-64");
/// assert_eq!(subdir.arch(), "x86_64");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Subdir {
    /// Linux on `x86_64` (glibc-based distributions).
    #[serde(rename = "linux-64")]
    Linux64,
    /// macOS on `x86_64`.
    #[serde(rename = "osx-64")]
    Osx64,
    /// Windows on `x86_64`.
    #[serde(rename = "win-64")]
    Win64,
    /// Platform-independent packages (pure Python).
    #[serde(rename = "noarch")]
    Noarch,
}

impl Subdir {
    /// The conda subdir string (`linux-64`, `osx-64`, `win-64`, `noarch`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linux64 => "linux-64",
            Self::Osx64 => "osx-64",
            Self::Win64 => "win-64",
            Self::Noarch => "noarch",
        }
    }

    /// The CPU architecture wheels must declare to land in this subdir.
    ///
    /// All supported subdirs are `x86_64`; `noarch` has no architecture and
    /// returns the wheel wildcard `any`.
    pub fn arch(&self) -> &'static str {
        match self {
            Self::Linux64 | Self::Osx64 | Self::Win64 => "x86_64",
            Self::Noarch => "any",
        }
    }
}

impl std::fmt::Display for Subdir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Subdir {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linux-64" => Ok(Self::Linux64),
            "osx-64" => Ok(Self::Osx64),
            "win-64" => Ok(Self::Win64),
            "noarch" => Ok(Self::Noarch),
            _ => Err(format!("Unknown subdir: {s}")),
        }
    }
}
