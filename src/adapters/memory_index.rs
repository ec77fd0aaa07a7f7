use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

use crate::adapters::{IndexLookup, IndexWriter};
use crate::config::ResolvedSyncConfig;
use crate::error::IndexError;
use crate::models::{Content, FieldMap};

/// One record in the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub local_id: String,
    pub fields: FieldMap,
    pub content_length: u64,
    pub last_modified: DateTime<Utc>,
    /// Indexed without metadata
    pub standalone: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    documents: Vec<IndexedDocument>,
}

/// Index held in memory. Writes are visible to lookups as soon as they return.
/// Snapshots persist the index between CLI runs.
#[derive(Debug)]
pub struct MemoryIndex {
    documents: RwLock<BTreeMap<String, IndexedDocument>>,
    metadata_path_field: String,
    local_id_field: String,
}

impl MemoryIndex {
    pub fn new(metadata_path_field: impl Into<String>, local_id_field: impl Into<String>) -> Self {
        Self {
            documents: RwLock::new(BTreeMap::new()),
            metadata_path_field: metadata_path_field.into(),
            local_id_field: local_id_field.into(),
        }
    }

    pub fn from_config(config: &ResolvedSyncConfig) -> Self {
        Self::new(&config.metadata_path_field, &config.local_id_field)
    }

    /// Load a snapshot; a missing file yields an empty index
    pub async fn load(path: &Path, config: &ResolvedSyncConfig) -> anyhow::Result<Self> {
        let index = Self::from_config(config);

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No index snapshot at {:?}, starting empty", path);
                return Ok(index);
            }
            Err(e) => {
                return Err(e).context(format!("Failed to read index snapshot: {path:?}"))
            }
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .context(format!("Failed to parse index snapshot: {path:?}"))?;

        {
            let mut documents = index.documents.write().await;
            for document in snapshot.documents {
                documents.insert(document.local_id.clone(), document);
            }
        }

        Ok(index)
    }

    pub async fn save(&self, path: &Path) -> anyhow::Result<()> {
        let snapshot = Snapshot {
            documents: self.documents().await,
        };
        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| IndexError::Snapshot(e.to_string()))?;
        tokio::fs::write(path, json)
            .await
            .context(format!("Failed to write index snapshot: {path:?}"))
    }

    pub async fn get(&self, path: &str) -> Option<IndexedDocument> {
        self.documents.read().await.get(path).cloned()
    }

    /// All records ordered by local id
    pub async fn documents(&self) -> Vec<IndexedDocument> {
        self.documents.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    async fn put(&self, document: IndexedDocument) {
        self.documents
            .write()
            .await
            .insert(document.local_id.clone(), document);
    }
}

#[async_trait]
impl IndexLookup for MemoryIndex {
    async fn binaries_for_metadata(&self, metadata_path: &str) -> Result<Vec<String>, IndexError> {
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .filter(|d| {
                d.fields
                    .get(&self.metadata_path_field)
                    .is_some_and(|values| values.iter().any(|v| v == metadata_path))
            })
            .map(|d| d.local_id.clone())
            .collect())
    }

    async fn metadata_for_binary(&self, binary_path: &str) -> Result<Option<String>, IndexError> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(binary_path)
            .and_then(|d| d.fields.first(&self.metadata_path_field))
            .map(str::to_string))
    }
}

#[async_trait]
impl IndexWriter for MemoryIndex {
    async fn update_with_metadata(
        &self,
        path: &str,
        content: Content,
        fields: &FieldMap,
    ) -> Result<(), IndexError> {
        let mut fields = fields.clone();
        fields.set(self.local_id_field.as_str(), path);

        self.put(IndexedDocument {
            local_id: path.to_string(),
            fields,
            content_length: content.len(),
            last_modified: content.last_modified,
            standalone: false,
        })
        .await;
        Ok(())
    }

    async fn update_standalone(&self, path: &str, content: Content) -> Result<(), IndexError> {
        let mut fields = FieldMap::new();
        fields.set(self.local_id_field.as_str(), path);

        self.put(IndexedDocument {
            local_id: path.to_string(),
            fields,
            content_length: content.len(),
            last_modified: content.last_modified,
            standalone: true,
        })
        .await;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), IndexError> {
        self.documents.write().await.remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fields_for(metadata_path: &str) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.add("title", "Report");
        fields.set("metadataPath", metadata_path);
        fields
    }

    #[tokio::test]
    async fn test_reverse_lookups_follow_writes() {
        let index = MemoryIndex::new("metadataPath", "localId");
        index
            .update_with_metadata("/b.pdf", Content::empty(), &fields_for("/site/m.xml"))
            .await
            .unwrap();
        index
            .update_with_metadata("/a.pdf", Content::empty(), &fields_for("/site/m.xml"))
            .await
            .unwrap();
        index.update_standalone("/c.pdf", Content::empty()).await.unwrap();

        assert_eq!(
            index.binaries_for_metadata("/site/m.xml").await.unwrap(),
            vec!["/a.pdf", "/b.pdf"]
        );
        assert_eq!(
            index.metadata_for_binary("/a.pdf").await.unwrap().as_deref(),
            Some("/site/m.xml")
        );
        assert!(index.metadata_for_binary("/c.pdf").await.unwrap().is_none());

        let record = index.get("/a.pdf").await.unwrap();
        assert_eq!(record.fields.first("localId"), Some("/a.pdf"));
        assert!(!record.standalone);

        index.delete("/a.pdf").await.unwrap();
        assert_eq!(
            index.binaries_for_metadata("/site/m.xml").await.unwrap(),
            vec!["/b.pdf"]
        );
    }

    #[tokio::test]
    async fn test_standalone_update_drops_metadata() {
        let index = MemoryIndex::new("metadataPath", "localId");
        index
            .update_with_metadata("/a.pdf", Content::empty(), &fields_for("/site/m.xml"))
            .await
            .unwrap();
        index
            .update_standalone("/a.pdf", Content::new(b"abc".to_vec(), Utc::now()))
            .await
            .unwrap();

        let record = index.get("/a.pdf").await.unwrap();
        assert!(record.standalone);
        assert_eq!(record.content_length, 3);
        assert!(index.binaries_for_metadata("/site/m.xml").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let snapshot = dir.path().join("index.json");
        let config = ResolvedSyncConfig::default();

        let index = MemoryIndex::load(&snapshot, &config).await.unwrap();
        assert!(index.is_empty().await);
        index
            .update_with_metadata("/a.pdf", Content::empty(), &fields_for("/site/m.xml"))
            .await
            .unwrap();
        index.save(&snapshot).await.unwrap();

        let reloaded = MemoryIndex::load(&snapshot, &config).await.unwrap();
        assert_eq!(reloaded.documents().await, index.documents().await);
        assert_eq!(reloaded.len().await, 1);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_error() {
        let dir = TempDir::new().unwrap();
        let snapshot = dir.path().join("index.json");
        std::fs::write(&snapshot, "not json").unwrap();
        assert!(MemoryIndex::load(&snapshot, &ResolvedSyncConfig::default())
            .await
            .is_err());
    }
}
