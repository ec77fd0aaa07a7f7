use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Paths changed since the previous sync of a site
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSet {
    /// Paths created or modified
    #[serde(default)]
    pub update_paths: IndexSet<String>,
    /// Paths removed
    #[serde(default)]
    pub delete_paths: IndexSet<String>,
}

impl UpdateSet {
    pub fn new<U, D>(updates: U, deletes: D) -> Self
    where
        U: IntoIterator,
        U::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self {
            update_paths: updates.into_iter().map(Into::into).collect(),
            delete_paths: deletes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn updates<U>(updates: U) -> Self
    where
        U: IntoIterator,
        U::Item: Into<String>,
    {
        Self::new(updates, Vec::<String>::new())
    }

    pub fn deletes<D>(deletes: D) -> Self
    where
        D: IntoIterator,
        D::Item: Into<String>,
    {
        Self::new(Vec::<String>::new(), deletes)
    }

    pub fn is_empty(&self) -> bool {
        self.update_paths.is_empty() && self.delete_paths.is_empty()
    }

    pub fn len(&self) -> usize {
        self.update_paths.len() + self.delete_paths.len()
    }
}

/// Bytes of a binary file together with its modification time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub bytes: Vec<u8>,
    pub last_modified: DateTime<Utc>,
}

impl Content {
    pub fn new(bytes: Vec<u8>, last_modified: DateTime<Utc>) -> Self {
        Self {
            bytes,
            last_modified,
        }
    }

    /// Zero-length stand-in used when a referenced binary has no readable content,
    /// so the record and its metadata stay searchable.
    pub fn empty() -> Self {
        Self {
            bytes: Vec::new(),
            last_modified: Utc::now(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Flattened metadata fields: dotted property key to one or more values, in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMap {
    fields: IndexMap<String, Vec<String>>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `key`, keeping earlier values
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(key.into()).or_default().push(value.into());
    }

    /// Replace every value under `key` with a single value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), vec![value.into()]);
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.fields.get(key).map(Vec::as_slice)
    }

    /// First value under `key`
    pub fn first(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
