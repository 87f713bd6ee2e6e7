//! Core types shared by the migration registry.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of a shard (replica set) in the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId(String);

impl ShardId {
    /// Create a shard id from its name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the shard name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ShardId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A fully qualified collection name, `<db>.<collection>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespaceString {
    ns: String,
    /// Byte offset of the first `.`.
    dot: usize,
}

impl NamespaceString {
    /// Parse a namespace of the form `db.collection`.
    ///
    /// The collection part may itself contain dots (`db.system.views`);
    /// only the first dot separates the database.
    pub fn parse(ns: impl Into<String>) -> Result<Self> {
        let ns = ns.into();
        let dot = ns
            .find('.')
            .ok_or_else(|| Error::InvalidNamespace(format!("missing '.' in {:?}", ns)))?;

        if dot == 0 {
            return Err(Error::InvalidNamespace(format!("empty database in {:?}", ns)));
        }
        if dot + 1 == ns.len() {
            return Err(Error::InvalidNamespace(format!("empty collection in {:?}", ns)));
        }

        Ok(Self { ns, dot })
    }

    /// Database part.
    pub fn db(&self) -> &str {
        &self.ns[..self.dot]
    }

    /// Collection part.
    pub fn coll(&self) -> &str {
        &self.ns[self.dot + 1..]
    }

    /// Full namespace string.
    pub fn as_str(&self) -> &str {
        &self.ns
    }
}

impl TryFrom<String> for NamespaceString {
    type Error = Error;

    fn try_from(ns: String) -> Result<Self> {
        Self::parse(ns)
    }
}

impl From<NamespaceString> for String {
    fn from(nss: NamespaceString) -> Self {
        nss.ns
    }
}

impl fmt::Display for NamespaceString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ns)
    }
}

/// A single shard-key bound.
///
/// Values of different kinds compare by kind first:
/// `MinKey < Int < Str < MaxKey`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyValue {
    /// Sorts below every other value.
    MinKey,
    /// Integer key.
    Int(i64),
    /// String key.
    Str(String),
    /// Sorts above every other value.
    MaxKey,
}

impl KeyValue {
    fn rank(&self) -> u8 {
        match self {
            KeyValue::MinKey => 0,
            KeyValue::Int(_) => 1,
            KeyValue::Str(_) => 2,
            KeyValue::MaxKey => 3,
        }
    }
}

impl Ord for KeyValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyValue::Int(a), KeyValue::Int(b)) => a.cmp(b),
            (KeyValue::Str(a), KeyValue::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for KeyValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyValue::MinKey => write!(f, "MinKey"),
            KeyValue::Int(v) => write!(f, "{}", v),
            KeyValue::Str(s) => write!(f, "{:?}", s),
            KeyValue::MaxKey => write!(f, "MaxKey"),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        KeyValue::Int(v)
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        KeyValue::Int(v.into())
    }
}

impl From<&str> for KeyValue {
    fn from(s: &str) -> Self {
        KeyValue::Str(s.to_string())
    }
}

/// Half-open key range `[min, max)` covered by a chunk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRange {
    min: KeyValue,
    max: KeyValue,
}

impl ChunkRange {
    /// Create a range, rejecting empty or inverted bounds.
    pub fn new(min: impl Into<KeyValue>, max: impl Into<KeyValue>) -> Result<Self> {
        let min = min.into();
        let max = max.into();
        if min >= max {
            return Err(Error::InvalidChunkRange(format!(
                "min {} must be less than max {}",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    /// Lower bound (inclusive).
    pub fn min(&self) -> &KeyValue {
        &self.min
    }

    /// Upper bound (exclusive).
    pub fn max(&self) -> &KeyValue {
        &self.max
    }

    /// Check whether `key` falls inside the range.
    pub fn contains(&self, key: &KeyValue) -> bool {
        *key >= self.min && *key < self.max
    }

    /// Check whether two ranges share any key.
    pub fn overlaps(&self, other: &ChunkRange) -> bool {
        self.min < other.max && other.min < self.max
    }
}

impl fmt::Display for ChunkRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.min, self.max)
    }
}
