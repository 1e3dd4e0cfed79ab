//! Dotted numeric version identifiers

use std::{cmp::Ordering, fmt, str::FromStr};

use crate::error::GupError;

/// A version such as `1.0.0`, compared numerically segment by segment.
///
/// The original text is kept so installer file names and responses use
/// exactly what the operator published.
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    segments: Vec<u64>,
}

impl Version {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    pub fn arity(&self) -> usize {
        self.segments.len()
    }
}

/// Three-way comparison: `Greater` when `a` is newer than `b`.
///
/// When one version is a prefix of the other the shorter one is older.
pub fn compare(a: &Version, b: &Version) -> Ordering {
    a.segments.cmp(&b.segments)
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(self, other)
    }
}

impl FromStr for Version {
    type Err = GupError;

    /// Parses any number of segments. Each segment must be a non-empty run of
    /// ASCII digits that fits in a `u64`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GupError::InvalidVersion(s.to_string());

        let segments = s
            .split('.')
            .map(|segment| {
                if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                segment.parse::<u64>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Version {
            raw: s.to_string(),
            segments,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// The version shape a deployment accepts, e.g. three segments for
/// `major.minor.patch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionFormat {
    segments: usize,
}

impl VersionFormat {
    pub fn new(segments: usize) -> Result<Self, GupError> {
        if segments == 0 {
            return Err(GupError::Config(
                "version format needs at least one segment".to_string(),
            ));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Strict parse: exactly `segments` dotted integers and nothing else.
    pub fn parse(&self, raw: &str) -> Result<Version, GupError> {
        let version = raw.parse::<Version>()?;
        if version.arity() != self.segments {
            return Err(GupError::InvalidVersion(raw.to_string()));
        }
        Ok(version)
    }
}

impl Default for VersionFormat {
    fn default() -> Self {
        Self { segments: 3 }
    }
}
