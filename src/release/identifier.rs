// src/release/identifier.rs

//! Release identifiers: `<prefix>-<YYYYMMDDHHMMSS>-<short commit>`.
//!
//! The timestamp is UTC with a fixed width, so plain string ordering of
//! identifiers sharing a prefix is creation order. The short commit makes the
//! originating commit recoverable from the identifier alone.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::Serialize;

use crate::errors::{Result, ShipyardError};

/// Length of the abbreviated commit embedded in identifiers.
pub const SHORT_COMMIT_LEN: usize = 7;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

static ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>[A-Za-z][A-Za-z0-9._]*)-(?P<ts>\d{14})-(?P<commit>[0-9a-f]{7,40})$")
        .expect("static regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub struct ReleaseId {
    // Field order matters for the derived `Ord`.
    prefix: String,
    created_at: DateTime<Utc>,
    short_commit: String,
}

impl ReleaseId {
    /// Build an identifier from its parts.
    ///
    /// Sub-second precision is dropped; `commit` may be full or abbreviated
    /// and is cut to [`SHORT_COMMIT_LEN`] characters.
    pub fn new(prefix: &str, created_at: DateTime<Utc>, commit: &str) -> Result<Self> {
        let commit = commit.trim().to_ascii_lowercase();
        if commit.len() < SHORT_COMMIT_LEN || !commit.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ShipyardError::Git(format!(
                "'{commit}' is not a commit hash"
            )));
        }
        let created_at = truncate_to_seconds(created_at);
        let id = Self {
            prefix: prefix.to_string(),
            created_at,
            short_commit: commit[..SHORT_COMMIT_LEN].to_string(),
        };
        // Round-trip through the parser so a bad prefix cannot slip in.
        id.to_string().parse()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn short_commit(&self) -> &str {
        &self.short_commit
    }

    /// Whether `commit` (full or abbreviated) is the commit this release names.
    pub fn names_commit(&self, commit: &str) -> bool {
        let commit = commit.trim().to_ascii_lowercase();
        commit.starts_with(&self.short_commit) || self.short_commit.starts_with(&commit)
    }

    /// Parse, additionally requiring a specific prefix.
    pub fn parse_with_prefix(s: &str, prefix: &str) -> Result<Self> {
        let id: ReleaseId = s.parse()?;
        if id.prefix != prefix {
            return Err(ShipyardError::Resolution {
                identifier: s.to_string(),
                detail: format!("expected prefix '{prefix}'"),
            });
        }
        Ok(id)
    }
}

fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_opt(ts.timestamp(), 0).single().unwrap_or(ts)
}

impl FromStr for ReleaseId {
    type Err = ShipyardError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |detail: &str| ShipyardError::Resolution {
            identifier: s.to_string(),
            detail: detail.to_string(),
        };

        let caps = ID_RE
            .captures(s.trim())
            .ok_or_else(|| invalid("not of the form <prefix>-<YYYYMMDDHHMMSS>-<commit>"))?;

        let naive = NaiveDateTime::parse_from_str(&caps["ts"], TIMESTAMP_FORMAT)
            .map_err(|e| invalid(&format!("bad timestamp: {e}")))?;

        Ok(Self {
            prefix: caps["prefix"].to_string(),
            created_at: Utc.from_utc_datetime(&naive),
            short_commit: caps["commit"].to_string(),
        })
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.prefix,
            self.created_at.format(TIMESTAMP_FORMAT),
            self.short_commit
        )
    }
}

impl From<ReleaseId> for String {
    fn from(id: ReleaseId) -> Self {
        id.to_string()
    }
}

/// An immutable, published release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    pub identifier: ReleaseId,
    pub source_commit: String,
    pub created_at: DateTime<Utc>,
}
