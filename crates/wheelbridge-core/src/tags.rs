//! Wheel compatibility-tag parsing and matching.
//!
//! A wheel filename ends in a `{python}-{abi}-{platform}` tag segment, each
//! component possibly carrying several `.`-separated values (a compressed tag
//! set). Matching expands the set and accepts the wheel if any expanded tag
//! is compatible with the target subdir, Python version, and assumed system
//! baselines.

use crate::error::{Error, Result};
use pep440_rs::Version;
use std::str::FromStr;
use wheelbridge_schema::Subdir;

/// Assumed minimum system baselines of the target environment, used to
/// reject wheels that require a newer OS or libc than the environment
/// provides.
#[derive(Debug, Clone)]
pub struct SystemLowerBounds {
    /// Minimum macOS version (`macosx_{major}_{minor}_*` tags).
    pub osx: String,
    /// Minimum glibc version (`manylinux*` tags).
    pub glibc: String,
    /// Windows baseline; unused, win tags encode no system version.
    pub win: String,
}

impl Default for SystemLowerBounds {
    fn default() -> Self {
        Self {
            osx: "10.9".to_string(),
            glibc: "2.17".to_string(),
            win: String::new(),
        }
    }
}

/// One expanded (interpreter, abi, platform) compatibility tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelTag {
    /// Interpreter tag, e.g. `cp39` or `py3`.
    pub interpreter: String,
    /// ABI tag, e.g. `cp39` or `none`.
    pub abi: String,
    /// Platform tag, e.g. `manylinux_2_17_x86_64` or `any`.
    pub platform: String,
}

/// Expand a possibly compressed tag segment (`py2.py3-none-any`) into its
/// cartesian product of concrete tags.
///
/// # Errors
///
/// Returns [`Error::InvalidMetadata`] if the segment does not have exactly
/// three `-`-separated components.
pub fn parse_tag(tag_str: &str) -> Result<Vec<WheelTag>> {
    let parts: Vec<&str> = tag_str.split('-').collect();
    if parts.len() != 3 {
        return Err(Error::InvalidMetadata(format!(
            "Malformed wheel tag segment: '{tag_str}'"
        )));
    }
    let (interpreters, abis, platforms) = (parts[0], parts[1], parts[2]);

    let mut tags = Vec::new();
    for interpreter in interpreters.split('.') {
        for abi in abis.split('.') {
            for platform in platforms.split('.') {
                tags.push(WheelTag {
                    interpreter: interpreter.to_string(),
                    abi: abi.to_string(),
                    platform: platform.to_string(),
                });
            }
        }
    }
    Ok(tags)
}

/// Map a wheel platform tag to the subdir family it belongs to.
///
/// # Errors
///
/// Returns [`Error::UnknownPlatformTag`] for platform strings outside the
/// supported families; those indicate a packaging scheme this mapping does
/// not cover and must not be silently treated as "no match".
pub fn platform_tag_to_subdir(platform: &str) -> Result<Subdir> {
    if platform == "any" {
        return Ok(Subdir::Noarch);
    }
    if platform.contains("win") {
        return Ok(Subdir::Win64);
    }
    if platform.contains("macosx") {
        return Ok(Subdir::Osx64);
    }
    if platform.contains("linux") {
        return Ok(Subdir::Linux64);
    }
    Err(Error::UnknownPlatformTag(platform.to_string()))
}

/// Whether any tag expanded from `tag_str` is compatible with the target
/// subdir, Python version, and system lower bounds.
///
/// Checks within one tag are conjunctive; acceptance across expanded tags is
/// disjunctive. Interpreter families other than CPython (`cp*`) and generic
/// (`py*`) are skipped, not errors.
///
/// # Errors
///
/// Propagates [`Error::UnknownPlatformTag`] from the subdir mapping and
/// [`Error::InvalidMetadata`] for malformed tag segments.
pub fn tags_match(
    tag_str: &str,
    target: Subdir,
    python_version: &str,
    bounds: &SystemLowerBounds,
) -> Result<bool> {
    for tag in parse_tag(tag_str)? {
        if !interpreter_matches(&tag.interpreter, python_version)? {
            continue;
        }
        let subdir = platform_tag_to_subdir(&tag.platform)?;
        if subdir != target && subdir != Subdir::Noarch {
            continue;
        }
        if !platform_matches(&tag.platform, target, bounds)? {
            continue;
        }
        return Ok(true);
    }
    Ok(false)
}

/// Whether an interpreter tag is compatible with the requested Python
/// version. `py3` (major only) matches any 3.x; `cp39` must equal the
/// requested version exactly.
fn interpreter_matches(interpreter: &str, python_version: &str) -> Result<bool> {
    let Some(pyver) = interpreter
        .strip_prefix("py")
        .or_else(|| interpreter.strip_prefix("cp"))
    else {
        // Not a generic or CPython tag (pp, graalpy, ...); skip.
        return Ok(false);
    };
    if pyver.len() == 1 {
        return Ok(pyver.chars().next() == python_version.chars().next());
    }
    if pyver.len() > 1 {
        let tag_version = parse_version(&format!("{}.{}", &pyver[..1], &pyver[1..]))?;
        let requested = parse_version(python_version)?;
        return Ok(tag_version == requested);
    }
    Ok(true)
}

/// Whether a platform tag's architecture and declared system baseline are
/// compatible with the target.
fn platform_matches(platform: &str, target: Subdir, bounds: &SystemLowerBounds) -> Result<bool> {
    if platform == "any" {
        return Ok(true);
    }
    let target_arch = target.arch();

    let (system_lower_bound, tag_lower_bound, arch) = match target {
        Subdir::Linux64 => {
            if !platform.contains("manylinux") {
                return Ok(false);
            }
            // Legacy aliases carry fixed glibc baselines; the PEP 600 scheme
            // encodes the baseline directly: manylinux_{major}_{minor}_{arch}.
            let (bound, arch) = if let Some(rest) = platform.strip_prefix("manylinux1_") {
                ("2.5".to_string(), rest.to_string())
            } else if let Some(rest) = platform.strip_prefix("manylinux2010_") {
                ("2.12".to_string(), rest.to_string())
            } else if let Some(rest) = platform.strip_prefix("manylinux2014_") {
                ("2.17".to_string(), rest.to_string())
            } else {
                let mut parts = platform.splitn(4, '_');
                let (Some(_), Some(major), Some(minor), Some(arch)) =
                    (parts.next(), parts.next(), parts.next(), parts.next())
                else {
                    return Err(Error::InvalidMetadata(format!(
                        "Malformed manylinux tag: '{platform}'"
                    )));
                };
                (format!("{major}.{minor}"), arch.to_string())
            };
            (bounds.glibc.clone(), bound, arch)
        }
        Subdir::Osx64 => {
            let mut parts = platform.splitn(4, '_');
            let (Some(_), Some(major), Some(minor), Some(arch)) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(Error::InvalidMetadata(format!(
                    "Malformed macosx tag: '{platform}'"
                )));
            };
            (bounds.osx.clone(), format!("{major}.{minor}"), arch.to_string())
        }
        // Windows tags encode no system baseline; only the arch is checked.
        Subdir::Win64 => {
            let arch = platform.strip_prefix("win_").unwrap_or("x86_64");
            let arch = if arch == "amd64" { "x86_64" } else { arch };
            return Ok(arch == target_arch || arch.starts_with("universal"));
        }
        Subdir::Noarch => return Ok(true),
    };

    if arch != target_arch && !arch.starts_with("universal") {
        return Ok(false);
    }
    if parse_version(&system_lower_bound)? < parse_version(&tag_lower_bound)? {
        return Ok(false);
    }
    Ok(true)
}

fn parse_version(s: &str) -> Result<Version> {
    Version::from_str(s).map_err(|e| Error::InvalidMetadata(format!("Bad version '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> SystemLowerBounds {
        SystemLowerBounds::default()
    }

    #[test]
    fn test_manylinux_matches_when_baseline_new_enough() {
        assert!(tags_match(
            "cp39-cp39-manylinux_2_17_x86_64",
            Subdir::Linux64,
            "3.9",
            &bounds(),
        )
        .unwrap());
    }

    #[test]
    fn test_manylinux_rejected_when_baseline_too_old() {
        let old = SystemLowerBounds {
            glibc: "2.12".to_string(),
            ..bounds()
        };
        assert!(!tags_match(
            "cp39-cp39-manylinux_2_17_x86_64",
            Subdir::Linux64,
            "3.9",
            &old,
        )
        .unwrap());
    }

    #[test]
    fn test_universal_wheel_matches_everywhere() {
        for target in [Subdir::Linux64, Subdir::Osx64, Subdir::Win64] {
            for python in ["3.9", "3.12"] {
                assert!(tags_match("py3-none-any", target, python, &bounds()).unwrap());
            }
        }
    }

    #[test]
    fn test_runtime_version_mismatch() {
        assert!(!tags_match(
            "cp310-cp310-win_amd64",
            Subdir::Win64,
            "3.9",
            &bounds(),
        )
        .unwrap());
    }

    #[test]
    fn test_win_wheel_matches_on_version() {
        assert!(tags_match(
            "cp310-cp310-win_amd64",
            Subdir::Win64,
            "3.10",
            &bounds(),
        )
        .unwrap());
    }

    #[test]
    fn test_legacy_manylinux_aliases() {
        // manylinux1 -> glibc 2.5, manylinux2010 -> 2.12, manylinux2014 -> 2.17
        for tag in [
            "cp39-cp39-manylinux1_x86_64",
            "cp39-cp39-manylinux2010_x86_64",
            "cp39-cp39-manylinux2014_x86_64",
        ] {
            assert!(tags_match(tag, Subdir::Linux64, "3.9", &bounds()).unwrap(), "{tag}");
        }
        let ancient = SystemLowerBounds {
            glibc: "2.4".to_string(),
            ..bounds()
        };
        assert!(!tags_match("cp39-cp39-manylinux1_x86_64", Subdir::Linux64, "3.9", &ancient).unwrap());
    }

    #[test]
    fn test_compressed_tag_set_expansion() {
        // Any member of the expanded set may match.
        assert!(tags_match("py2.py3-none-any", Subdir::Linux64, "3.9", &bounds()).unwrap());
        let tags = parse_tag("py2.py3-none-any").unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_wrong_subdir_is_no_match() {
        assert!(!tags_match(
            "cp39-cp39-manylinux_2_17_x86_64",
            Subdir::Osx64,
            "3.9",
            &bounds(),
        )
        .unwrap());
    }

    #[test]
    fn test_wrong_arch_is_no_match() {
        assert!(!tags_match(
            "cp39-cp39-manylinux_2_17_aarch64",
            Subdir::Linux64,
            "3.9",
            &bounds(),
        )
        .unwrap());
    }

    #[test]
    fn test_macosx_baseline_and_universal2() {
        assert!(tags_match(
            "cp39-cp39-macosx_10_9_x86_64",
            Subdir::Osx64,
            "3.9",
            &bounds(),
        )
        .unwrap());
        // Requires macOS 11, environment assumes 10.9.
        assert!(!tags_match(
            "cp39-cp39-macosx_11_0_x86_64",
            Subdir::Osx64,
            "3.9",
            &bounds(),
        )
        .unwrap());
        // universal2 counts as an architecture wildcard.
        assert!(tags_match(
            "cp39-cp39-macosx_10_9_universal2",
            Subdir::Osx64,
            "3.9",
            &bounds(),
        )
        .unwrap());
    }

    #[test]
    fn test_non_cpython_interpreter_skipped() {
        // PyPy is ignored, not an error.
        assert!(!tags_match("pp39-pypy39_pp73-win_amd64", Subdir::Win64, "3.9", &bounds()).unwrap());
    }

    #[test]
    fn test_major_only_interpreter_matches_any_minor() {
        assert!(tags_match("py3-none-any", Subdir::Linux64, "3.12", &bounds()).unwrap());
        assert!(!tags_match("py2-none-any", Subdir::Linux64, "3.12", &bounds()).unwrap());
    }

    #[test]
    fn test_unknown_platform_is_hard_error() {
        let err = tags_match("cp39-cp39-freebsd_13_x86_64", Subdir::Linux64, "3.9", &bounds())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownPlatformTag(_)));
    }
}
