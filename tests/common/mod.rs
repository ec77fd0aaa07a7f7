//! In-memory collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use index_sync::adapters::{
    ContentRepository, IndexLookup, IndexWriter, RemoteFile, RemoteFileResolver,
};
use index_sync::{
    Content, FieldMap, IndexError, MetadataDocument, RepositoryError, ResolvedSyncConfig,
};

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Configuration used by most tests: `/site/**` metadata, `/static-assets/**` binaries,
/// `/static-assets/children/**` child binaries, `/remote-assets/**` remote binaries
pub fn test_config() -> ResolvedSyncConfig {
    let mut config = ResolvedSyncConfig::default();
    config.binary_patterns = vec!["/static-assets/.+".into(), "/remote-assets/.+".into()];
    config.child_binary_patterns = vec!["/static-assets/children/.+".into()];
    config.remote_binary_patterns = vec!["/remote-assets/.+".into()];
    config
}

/// Metadata document referencing `files` through `<file>` elements
pub fn item_xml(title: &str, files: &[&str]) -> String {
    let mut xml = format!("<item><title>{title}</title><files>");
    for file in files {
        xml.push_str(&format!("<file>{file}</file>"));
    }
    xml.push_str("</files></item>");
    xml
}

#[derive(Default)]
pub struct FakeRepository {
    documents: Mutex<HashMap<String, String>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    lengths: Mutex<HashMap<String, u64>>,
    failing_contents: Mutex<HashSet<String>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, path: &str, text: &str) -> Self {
        self.set_document(path, text);
        self
    }

    pub fn with_content(self, path: &str, bytes: &[u8]) -> Self {
        self.contents
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        self
    }

    /// Report `length` for `path` regardless of its stored content
    pub fn with_length(self, path: &str, length: u64) -> Self {
        self.lengths
            .lock()
            .unwrap()
            .insert(path.to_string(), length);
        self
    }

    pub fn with_failing_content(self, path: &str) -> Self {
        self.failing_contents
            .lock()
            .unwrap()
            .insert(path.to_string());
        self
    }

    pub fn set_document(&self, path: &str, text: &str) {
        self.documents
            .lock()
            .unwrap()
            .insert(path.to_string(), text.to_string());
    }

    pub fn remove_document(&self, path: &str) {
        self.documents.lock().unwrap().remove(path);
    }
}

#[async_trait]
impl ContentRepository for FakeRepository {
    async fn get_document(&self, path: &str) -> Result<Option<MetadataDocument>, RepositoryError> {
        let text = self.documents.lock().unwrap().get(path).cloned();
        text.map(|text| MetadataDocument::parse(path, text.as_bytes()))
            .transpose()
    }

    async fn get_content(&self, path: &str) -> Result<Option<Content>, RepositoryError> {
        if self.failing_contents.lock().unwrap().contains(path) {
            return Err(RepositoryError::Io {
                path: path.to_string(),
                source: std::io::Error::other("disk on fire"),
            });
        }
        Ok(self
            .contents
            .lock()
            .unwrap()
            .get(path)
            .map(|bytes| Content::new(bytes.clone(), fixed_time())))
    }

    async fn content_length(&self, path: &str) -> Result<Option<u64>, RepositoryError> {
        if let Some(length) = self.lengths.lock().unwrap().get(path) {
            return Ok(Some(*length));
        }
        Ok(self
            .contents
            .lock()
            .unwrap()
            .get(path)
            .map(|bytes| bytes.len() as u64))
    }
}

/// One index operation issued by an indexer
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    WithMetadata {
        path: String,
        fields: FieldMap,
        content_length: u64,
    },
    Standalone {
        path: String,
        content_length: u64,
    },
    Delete {
        path: String,
    },
}

impl WriteOp {
    pub fn path(&self) -> &str {
        match self {
            WriteOp::WithMetadata { path, .. }
            | WriteOp::Standalone { path, .. }
            | WriteOp::Delete { path } => path,
        }
    }
}

/// Index writer that records every operation and rejects configured paths
#[derive(Default)]
pub struct RecordingWriter {
    ops: Mutex<Vec<WriteOp>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(self, path: &str) -> Self {
        self.failing.lock().unwrap().insert(path.to_string());
        self
    }

    pub fn ops(&self) -> Vec<WriteOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn ops_for(&self, path: &str) -> Vec<WriteOp> {
        self.ops()
            .into_iter()
            .filter(|op| op.path() == path)
            .collect()
    }

    fn record(&self, op: WriteOp) -> Result<(), IndexError> {
        let path = op.path().to_string();
        self.ops.lock().unwrap().push(op);
        if self.failing.lock().unwrap().contains(&path) {
            return Err(IndexError::rejected(&path, "simulated rejection"));
        }
        Ok(())
    }
}

#[async_trait]
impl IndexWriter for RecordingWriter {
    async fn update_with_metadata(
        &self,
        path: &str,
        content: Content,
        fields: &FieldMap,
    ) -> Result<(), IndexError> {
        self.record(WriteOp::WithMetadata {
            path: path.to_string(),
            fields: fields.clone(),
            content_length: content.len(),
        })
    }

    async fn update_standalone(&self, path: &str, content: Content) -> Result<(), IndexError> {
        self.record(WriteOp::Standalone {
            path: path.to_string(),
            content_length: content.len(),
        })
    }

    async fn delete(&self, path: &str) -> Result<(), IndexError> {
        self.record(WriteOp::Delete {
            path: path.to_string(),
        })
    }
}

/// Reverse lookups answered from fixed associations
#[derive(Default)]
pub struct FakeLookup {
    binaries: HashMap<String, Vec<String>>,
    owners: HashMap<String, String>,
    failing: HashSet<String>,
    unavailable: bool,
}

impl FakeLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `metadata_path` currently owns `binaries`
    pub fn associate(mut self, metadata_path: &str, binaries: &[&str]) -> Self {
        for binary in binaries {
            self.owners
                .insert(binary.to_string(), metadata_path.to_string());
        }
        self.binaries.insert(
            metadata_path.to_string(),
            binaries.iter().map(|b| b.to_string()).collect(),
        );
        self
    }

    pub fn failing_on(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    /// Reverse lookups are not supported by this index at all
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    fn check(&self, path: &str) -> Result<(), IndexError> {
        if self.unavailable {
            return Err(IndexError::LookupUnavailable(
                "reverse lookups disabled".to_string(),
            ));
        }
        if self.failing.contains(path) {
            return Err(IndexError::Unavailable(format!("lookup of {path} timed out")));
        }
        Ok(())
    }
}

#[async_trait]
impl IndexLookup for FakeLookup {
    async fn binaries_for_metadata(&self, metadata_path: &str) -> Result<Vec<String>, IndexError> {
        self.check(metadata_path)?;
        Ok(self
            .binaries
            .get(metadata_path)
            .cloned()
            .unwrap_or_default())
    }

    async fn metadata_for_binary(&self, binary_path: &str) -> Result<Option<String>, IndexError> {
        self.check(binary_path)?;
        Ok(self.owners.get(binary_path).cloned())
    }
}

pub struct FakeRemoteFile {
    path: String,
    bytes: Vec<u8>,
}

#[async_trait]
impl RemoteFile for FakeRemoteFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        Some(fixed_time())
    }

    async fn read_all(&self) -> Result<Vec<u8>, RepositoryError> {
        Ok(self.bytes.clone())
    }
}

#[derive(Default)]
pub struct FakeRemoteResolver {
    files: HashMap<String, Vec<u8>>,
}

impl FakeRemoteResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: &str, bytes: &[u8]) -> Self {
        self.files.insert(path.to_string(), bytes.to_vec());
        self
    }
}

#[async_trait]
impl RemoteFileResolver for FakeRemoteResolver {
    async fn resolve(&self, path: &str) -> Result<Option<Box<dyn RemoteFile>>, RepositoryError> {
        Ok(self.files.get(path).map(|bytes| {
            Box::new(FakeRemoteFile {
                path: path.to_string(),
                bytes: bytes.clone(),
            }) as Box<dyn RemoteFile>
        }))
    }
}
