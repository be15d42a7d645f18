//! Version key normalization and ordering
//!
//! A version key is the canonical identifier `v<major>` or `v<major>_<minor>`
//! of one implementation of a component. Users may type keys loosely
//! (`2.2`, `V3`, ` v1_4 `); [`normalize`] turns those into the canonical form
//! or rejects them.

use std::cmp::Ordering;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

static KEY_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^v(\d+)(?:_(\d+))?$").expect("valid version key regex"));

/// Canonical version identifier
///
/// Ordering is numeric: major first, then minor (an absent minor sorts as 0
/// but before an explicit `_0`, so `v1 < v1_0 < v1_1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionKey {
    major: u64,
    minor: Option<u64>,
}

impl VersionKey {
    /// Build a major-only key (`v<major>`)
    pub fn major(major: u64) -> Self {
        Self { major, minor: None }
    }

    /// Build a key with a minor segment (`v<major>_<minor>`)
    pub fn with_minor(major: u64, minor: u64) -> Self {
        Self {
            major,
            minor: Some(minor),
        }
    }

    pub fn major_part(&self) -> u64 {
        self.major
    }

    pub fn minor_part(&self) -> Option<u64> {
        self.minor
    }

    /// Human-facing label, with `_` shown as `.` (`v1_2` -> `v1.2`)
    pub fn label(&self) -> String {
        match self.minor {
            Some(minor) => format!("v{}.{}", self.major, minor),
            None => format!("v{}", self.major),
        }
    }

    /// Identifier-safe form used in generated imports (`v1_2` -> `V1_2`)
    pub fn ident(&self) -> String {
        match self.minor {
            Some(minor) => format!("V{}_{}", self.major, minor),
            None => format!("V{}", self.major),
        }
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.minor {
            Some(minor) => write!(f, "v{}_{}", self.major, minor),
            None => write!(f, "v{}", self.major),
        }
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then_with(|| self.minor.unwrap_or(0).cmp(&other.minor.unwrap_or(0)))
            .then_with(|| self.minor.is_some().cmp(&other.minor.is_some()))
    }
}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for VersionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        normalize(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid version key: {}", raw)))
    }
}

impl std::str::FromStr for VersionKey {
    type Err = crate::error::EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s).ok_or_else(|| crate::error::EngineError::InvalidVersionFormat {
            input: s.to_string(),
        })
    }
}

/// Normalize loosely typed user input into a canonical key
///
/// Trims whitespace, strips one leading `v`/`V`, turns `.` separators into
/// `_`, and validates against `v<digits>(_<digits>)?`. Leading zeros are
/// dropped (`v01` -> `v1`). Returns `None` for anything malformed.
pub fn normalize(input: &str) -> Option<VersionKey> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    let candidate = format!("v{}", body.replace('.', "_"));

    let caps = KEY_PATTERN.captures(&candidate)?;
    let major = caps.get(1)?.as_str().parse::<u64>().ok()?;
    let minor = match caps.get(2) {
        Some(m) => Some(m.as_str().parse::<u64>().ok()?),
        None => None,
    };
    Some(VersionKey { major, minor })
}

/// Three-way numeric comparison of two keys: -1, 0 or 1
pub fn compare(a: &VersionKey, b: &VersionKey) -> i32 {
    match a.cmp(b) {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    }
}
