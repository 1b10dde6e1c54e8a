//! Version string helpers shared by all package formats.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{NexusError, Result};

static BUILD_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9]+\.)*[A-Za-z0-9]+$").expect("Invalid build id regex")
});

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Qualifier tokens marking a pre-release.
const UNSTABLE_TOKENS: &[&str] = &[
    "dev", "alpha", "a", "beta", "b", "rc", "pre", "preview", "snapshot",
];

/// Optional build identifier appended to a package version as `+<id>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildId(Option<String>);

impl BuildId {
    /// Parse a build id. An empty string clears it.
    pub fn parse(input: &str) -> Result<Self> {
        if input.is_empty() {
            return Ok(Self(None));
        }

        if !BUILD_ID_REGEX.is_match(input) {
            return Err(NexusError::invalid_argument(format!(
                "Invalid build id: \"{}\"",
                input
            )));
        }

        Ok(Self(Some(input.to_string())))
    }

    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Append `+<id>` to a non-empty version.
    pub fn apply(&self, version: &str) -> String {
        match &self.0 {
            Some(id) if !version.is_empty() => format!("{}+{}", version, id),
            _ => version.to_string(),
        }
    }
}

/// Normalize a package name read from a source document.
///
/// Trims surrounding whitespace, lower-cases and collapses inner whitespace to `-`.
pub fn normalize_package_name(name: &str) -> String {
    WHITESPACE_REGEX
        .replace_all(name.trim(), "-")
        .to_lowercase()
}

/// Decide whether a version string denotes a stable release.
///
/// Every `-` or `+` delimited qualifier is split into `.`/`_`/`-` separated
/// segments. A segment whose alphabetic head is a known pre-release token
/// (`alpha1`, `RC2`, `dev`, ...) marks the version unstable. Composer style
/// branch versions (`dev-master`) are unstable as well.
pub fn is_stable_version(version: &str) -> bool {
    let version = version.trim().to_ascii_lowercase();

    if version.starts_with("dev-") {
        return false;
    }

    let Some(pos) = version.find(['-', '+']) else {
        return true;
    };

    !version[pos + 1..]
        .split(['-', '+', '.', '_'])
        .any(is_unstable_segment)
}

fn is_unstable_segment(segment: &str) -> bool {
    let head = segment.trim_end_matches(|c: char| c.is_ascii_digit());
    !head.is_empty() && UNSTABLE_TOKENS.contains(&head)
}
