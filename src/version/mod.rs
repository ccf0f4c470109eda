// src/version/mod.rs

//! Version parsing, comparison, and constraint satisfaction
//!
//! Package versions are semantic-like triples with an optional monotonic
//! publish timestamp: `major.minor.patch[-timestamp]`. Missing components
//! default to zero and are remembered only for display, never for
//! comparison.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A package version
///
/// Total order: lexicographic on `(major, minor, patch)`, ties broken by
/// timestamp. An absent timestamp compares as zero.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    /// Monotonic publish timestamp (`YYYYMMDDhhmmss` as an integer)
    pub timestamp: Option<u64>,
    /// How many components the source string spelled out (display only)
    precision: u8,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            timestamp: None,
            precision: 3,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Parse a version string
    ///
    /// Accepts `M`, `M.m`, `M.m.p`, each optionally followed by
    /// `-timestamp`. Examples: `1`, `1.2`, `1.2.3`, `1.2.3-20240301120000`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::ParseError("empty version string".to_string()));
        }

        let (triple, timestamp) = match s.split_once('-') {
            Some((t, ts)) => {
                let stamp = ts.parse::<u64>().map_err(|e| {
                    Error::ParseError(format!("invalid timestamp in version '{}': {}", s, e))
                })?;
                (t, Some(stamp))
            }
            None => (s, None),
        };

        let parts: Vec<&str> = triple.split('.').collect();
        if parts.len() > 3 {
            return Err(Error::ParseError(format!(
                "version '{}' has more than three components",
                s
            )));
        }

        let mut components = [0u64; 3];
        for (index, part) in parts.iter().enumerate() {
            components[index] = part.parse::<u64>().map_err(|e| {
                Error::ParseError(format!("invalid component in version '{}': {}", s, e))
            })?;
        }

        Ok(Self {
            major: components[0],
            minor: components[1],
            patch: components[2],
            timestamp,
            precision: parts.len() as u8,
        })
    }

    /// Check whether this version satisfies `op` against `rhs`
    pub fn satisfies(&self, op: VersionOp, rhs: &Version) -> bool {
        match op {
            VersionOp::Any => true,
            VersionOp::Eq => self == rhs,
            VersionOp::Lt => self < rhs,
            VersionOp::Le => self <= rhs,
            VersionOp::Ge => self >= rhs,
            VersionOp::Gt => self > rhs,
        }
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.major == other.major
            && self.minor == other.minor
            && self.patch == other.patch
            && self.timestamp.unwrap_or(0) == other.timestamp.unwrap_or(0)
    }
}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.timestamp.unwrap_or(0).hash(state);
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch, self.timestamp.unwrap_or(0)).cmp(&(
            other.major,
            other.minor,
            other.patch,
            other.timestamp.unwrap_or(0),
        ))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            1 => write!(f, "{}", self.major)?,
            2 => write!(f, "{}.{}", self.major, self.minor)?,
            _ => write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?,
        }
        if let Some(ts) = self.timestamp {
            write!(f, "-{}", ts)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Version constraint operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VersionOp {
    /// Any version is acceptable
    #[default]
    Any,
    Eq,
    Lt,
    Le,
    Ge,
    Gt,
}

impl VersionOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionOp::Any => "*",
            VersionOp::Eq => "=",
            VersionOp::Lt => "<",
            VersionOp::Le => "<=",
            VersionOp::Ge => ">=",
            VersionOp::Gt => ">",
        }
    }
}

impl fmt::Display for VersionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VersionOp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "*" | "" | "any" => Ok(VersionOp::Any),
            "=" | "==" => Ok(VersionOp::Eq),
            "<" => Ok(VersionOp::Lt),
            "<=" => Ok(VersionOp::Le),
            ">=" => Ok(VersionOp::Ge),
            ">" => Ok(VersionOp::Gt),
            _ => Err(Error::ParseError(format!("unknown version operator: {}", s))),
        }
    }
}

impl Serialize for VersionOp {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VersionOp {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_triple() {
        let v = Version::parse("1.2.3").unwrap();
        assert_eq!(v.major, 1);
        assert_eq!(v.minor, 2);
        assert_eq!(v.patch, 3);
        assert_eq!(v.timestamp, None);
    }

    #[test]
    fn test_parse_with_timestamp() {
        let v = Version::parse("1.2.3-20240301120000").unwrap();
        assert_eq!(v.timestamp, Some(20240301120000));
    }

    #[test]
    fn test_parse_partial_components_display() {
        let v = Version::parse("1.2").unwrap();
        assert_eq!(v.patch, 0);
        assert_eq!(v.to_string(), "1.2");

        let v = Version::parse("2").unwrap();
        assert_eq!(v.to_string(), "2");
    }

    #[test]
    fn test_partial_compares_as_zero() {
        let short = Version::parse("1.2").unwrap();
        let long = Version::parse("1.2.0").unwrap();
        assert_eq!(short, long);
        assert_eq!(short.cmp(&long), Ordering::Equal);
    }

    #[test]
    fn test_ordering_lexicographic() {
        let a = Version::parse("1.2.3").unwrap();
        let b = Version::parse("1.2.4").unwrap();
        let c = Version::parse("1.10.0").unwrap();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_timestamp_breaks_ties() {
        let old = Version::parse("1.0.0-20240101000000").unwrap();
        let new = Version::parse("1.0.0-20240201000000").unwrap();
        assert!(old < new);
        assert_ne!(old, new);
    }

    #[test]
    fn test_satisfies_operators() {
        let v = Version::parse("1.5.0").unwrap();
        let bound = Version::parse("1.5.0").unwrap();
        let higher = Version::parse("2.0.0").unwrap();

        assert!(v.satisfies(VersionOp::Any, &higher));
        assert!(v.satisfies(VersionOp::Eq, &bound));
        assert!(v.satisfies(VersionOp::Le, &bound));
        assert!(v.satisfies(VersionOp::Ge, &bound));
        assert!(v.satisfies(VersionOp::Lt, &higher));
        assert!(!v.satisfies(VersionOp::Gt, &higher));
    }

    #[test]
    fn test_roundtrip() {
        for s in ["1.2.3", "0.1.0", "1.2", "3", "1.2.3-20240301120000"] {
            let v = Version::parse(s).unwrap();
            assert_eq!(v.to_string(), s);
            assert_eq!(Version::parse(&v.to_string()).unwrap(), v);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::parse("").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
        assert!(Version::parse("a.b.c").is_err());
        assert!(Version::parse("1.0.0-notatime").is_err());
    }
}
