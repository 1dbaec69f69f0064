//! Parser for wheel core metadata (the PEP 658 `{wheel_url}.metadata` file).
//!
//! Core metadata is an RFC 822-style header block; only the headers the
//! engine consumes are extracted. Continuation lines (leading whitespace)
//! are folded into the preceding header, and parsing stops at the first
//! blank line, which separates the headers from the long description body.

/// The subset of wheel core metadata the engine consumes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WheelMetadata {
    /// `Requires-Dist` entries, verbatim requirement strings.
    pub requires_dist: Vec<String>,
    /// `Requires-Python` constraint, if declared.
    pub requires_python: Option<String>,
    /// Free-form `License` field, if declared.
    pub license: Option<String>,
    /// SPDX `License-Expression` field, if declared (PEP 639).
    pub license_expression: Option<String>,
}

impl WheelMetadata {
    /// Parse a core-metadata document. Unknown headers are ignored; a
    /// document with no recognized headers parses to an empty value rather
    /// than erroring.
    pub fn parse(text: &str) -> Self {
        let mut out = Self::default();
        let mut current: Option<(String, String)> = None;

        for line in text.lines() {
            if line.trim().is_empty() {
                // End of the header block; the description body follows.
                break;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = current.as_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = current.take() {
                out.record_header(&name, value);
            }
            if let Some((name, value)) = line.split_once(':') {
                current = Some((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }
        if let Some((name, value)) = current.take() {
            out.record_header(&name, value);
        }
        out
    }

    fn record_header(&mut self, name: &str, value: String) {
        match name {
            "requires-dist" => self.requires_dist.push(value),
            "requires-python" => self.requires_python = Some(value),
            "license" => self.license = Some(value),
            "license-expression" => self.license_expression = Some(value),
            _ => {}
        }
    }

    /// License summary for the emitted record: the SPDX expression if
    /// present, else the first line of the `License` field, else `N/A`.
    pub fn license_summary(&self) -> String {
        if let Some(expr) = &self.license_expression {
            if !expr.is_empty() {
                return expr.clone();
            }
        }
        self.license
            .as_deref()
            .and_then(|l| l.lines().next())
            .filter(|l| !l.is_empty())
            .unwrap_or("N/A")
            .to_string()
    }
}
