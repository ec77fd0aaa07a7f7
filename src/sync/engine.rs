//! Metadata/binary reconciliation
//!
//! Pairs binaries with the metadata descriptors that reference them. For every changed
//! metadata file the previous associations (read back from the index) are diffed against
//! the references declared by the freshly parsed document:
//!
//! - binaries no longer referenced are deleted when they are child binaries, otherwise
//!   reindexed standalone
//! - binaries still referenced are reindexed with the document's fields
//!
//! Binaries changed on their own are reindexed with the fields of the metadata that
//! currently owns them, or standalone when there is none. Every per-path failure is
//! recorded in the [`UpdateStatus`] and the cycle moves on.

use async_trait::async_trait;
use indexmap::IndexSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::adapters::{ContentRepository, IndexLookup, IndexWriter, RemoteFileResolver};
use crate::classify::PathClassifier;
use crate::config::ResolvedSyncConfig;
use crate::error::{ConfigError, IndexError, SyncError};
use crate::metadata::{MetadataDocument, MetadataExtractor};
use crate::models::{Content, FieldMap, UpdateSet};
use crate::status::UpdateStatus;
use crate::sync::content::ContentResolver;
use crate::sync::BatchIndexer;

/// Lookup failures that mean the index cannot answer reverse lookups at all abort the
/// cycle; anything else is a per-path failure.
fn check_lookup_error(e: IndexError) -> Result<IndexError, SyncError> {
    match e {
        IndexError::LookupUnavailable(_) => Err(SyncError::Index(e)),
        other => Ok(other),
    }
}

/// Reconciles binaries and their metadata descriptors against the index
pub struct MetadataBinaryIndexer {
    classifier: Arc<PathClassifier>,
    extractor: Arc<MetadataExtractor>,
    repository: Arc<dyn ContentRepository>,
    lookup: Arc<dyn IndexLookup>,
    writer: Arc<dyn IndexWriter>,
    content: ContentResolver,
}

impl MetadataBinaryIndexer {
    pub fn new(
        config: &ResolvedSyncConfig,
        repository: Arc<dyn ContentRepository>,
        lookup: Arc<dyn IndexLookup>,
        writer: Arc<dyn IndexWriter>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::from_parts(
            Arc::new(config.classifier()?),
            Arc::new(config.extractor()?),
            repository,
            lookup,
            writer,
        ))
    }

    pub fn from_parts(
        classifier: Arc<PathClassifier>,
        extractor: Arc<MetadataExtractor>,
        repository: Arc<dyn ContentRepository>,
        lookup: Arc<dyn IndexLookup>,
        writer: Arc<dyn IndexWriter>,
    ) -> Self {
        let content = ContentResolver::new(repository.clone());
        Self {
            classifier,
            extractor,
            repository,
            lookup,
            writer,
            content,
        }
    }

    /// Fetch remote binaries through `resolver` before falling back to the repository
    pub fn with_remote_resolver(mut self, resolver: Arc<dyn RemoteFileResolver>) -> Self {
        self.content = self.content.with_remote(resolver);
        self
    }

    /// Run one reconciliation cycle. Per-path failures are recorded in `status`;
    /// only configuration problems return an error.
    pub async fn update_index(
        &self,
        update_set: &UpdateSet,
        status: &mut UpdateStatus,
    ) -> Result<(), SyncError> {
        let start = Instant::now();

        let mut metadata_updates: Vec<&str> = Vec::new();
        let mut binary_updates: IndexSet<String> = IndexSet::new();

        for path in &update_set.update_paths {
            let classification = self.classifier.classify(path);
            if classification.is_metadata {
                metadata_updates.push(path);
            } else if classification.is_binary {
                binary_updates.insert(path.clone());
            } else {
                debug!("Ignoring unclassified update {}", path);
            }
        }

        info!(
            "Sync cycle: {} metadata updates, {} binary updates, {} deletes",
            metadata_updates.len(),
            binary_updates.len(),
            update_set.delete_paths.len()
        );

        for metadata_path in metadata_updates {
            self.update_metadata(metadata_path, &mut binary_updates, status)
                .await?;
        }

        for binary_path in &binary_updates {
            self.update_binary(binary_path, status).await?;
        }

        for path in &update_set.delete_paths {
            self.delete_path(path, status).await?;
        }

        info!(
            "Sync cycle finished in {} ms: {}",
            start.elapsed().as_millis(),
            status
        );

        Ok(())
    }

    async fn update_metadata(
        &self,
        metadata_path: &str,
        binary_updates: &mut IndexSet<String>,
        status: &mut UpdateStatus,
    ) -> Result<(), SyncError> {
        let previous_binaries = match self.lookup.binaries_for_metadata(metadata_path).await {
            Ok(binaries) => binaries,
            Err(e) => {
                let e = check_lookup_error(e)?;
                warn!(
                    "Failed to look up binaries for metadata {}: {}",
                    metadata_path, e
                );
                status.add_failed_update(metadata_path);
                return Ok(());
            }
        };

        // A missing document is handled like a document without references
        let document = match self.repository.get_document(metadata_path).await {
            Ok(document) => document,
            Err(e) => {
                warn!("Failed to load metadata {}: {}", metadata_path, e);
                status.add_failed_update(metadata_path);
                return Ok(());
            }
        };

        let (new_binaries, fields) = match &document {
            Some(document) => (
                self.extractor.referenced_binaries(document),
                Some(self.extractor.extract(metadata_path, document)),
            ),
            None => {
                debug!("Metadata {} no longer exists", metadata_path);
                (IndexSet::new(), None)
            }
        };

        debug!(
            "Metadata {}: {} previous binaries, {} current references",
            metadata_path,
            previous_binaries.len(),
            new_binaries.len()
        );

        for removed in previous_binaries
            .iter()
            .filter(|b| !new_binaries.contains(b.as_str()))
        {
            binary_updates.shift_remove(removed.as_str());
            self.release_binary(removed, status).await;
        }

        if let Some(fields) = &fields {
            for binary_path in &new_binaries {
                binary_updates.shift_remove(binary_path.as_str());
                self.apply_update_with_metadata(binary_path, fields, status)
                    .await;
            }
        }

        Ok(())
    }

    async fn update_binary(
        &self,
        binary_path: &str,
        status: &mut UpdateStatus,
    ) -> Result<(), SyncError> {
        let metadata_path = match self.lookup.metadata_for_binary(binary_path).await {
            Ok(metadata_path) => metadata_path,
            Err(e) => {
                let e = check_lookup_error(e)?;
                warn!("Failed to look up metadata for {}: {}", binary_path, e);
                status.add_failed_update(binary_path);
                return Ok(());
            }
        };

        match metadata_path {
            Some(metadata_path) => match self.load_fields(&metadata_path).await {
                Some(fields) => {
                    self.apply_update_with_metadata(binary_path, &fields, status)
                        .await
                }
                None => self.apply_update_standalone(binary_path, status).await,
            },
            None => self.apply_update_standalone(binary_path, status).await,
        }

        Ok(())
    }

    async fn delete_path(&self, path: &str, status: &mut UpdateStatus) -> Result<(), SyncError> {
        if self.classifier.is_metadata(path) {
            let previous_binaries = match self.lookup.binaries_for_metadata(path).await {
                Ok(binaries) => binaries,
                Err(e) => {
                    let e = check_lookup_error(e)?;
                    warn!("Failed to look up binaries for deleted metadata {}: {}", path, e);
                    status.add_failed_delete(path);
                    return Ok(());
                }
            };

            debug!(
                "Deleted metadata {} releases {} binaries",
                path,
                previous_binaries.len()
            );
            for binary_path in &previous_binaries {
                self.release_binary(binary_path, status).await;
            }
        } else if self.classifier.is_binary(path) {
            self.apply_delete(path, status).await;
        } else {
            debug!("Ignoring unclassified delete {}", path);
        }

        Ok(())
    }

    /// A binary lost its metadata: child binaries go away, others stand alone
    async fn release_binary(&self, binary_path: &str, status: &mut UpdateStatus) {
        if self.classifier.is_child(binary_path) {
            self.apply_delete(binary_path, status).await;
        } else {
            self.apply_update_standalone(binary_path, status).await;
        }
    }

    async fn load_fields(&self, metadata_path: &str) -> Option<FieldMap> {
        match self.repository.get_document(metadata_path).await {
            Ok(Some(document)) => Some(self.extract(metadata_path, &document)),
            Ok(None) => {
                debug!("Owning metadata {} no longer exists", metadata_path);
                None
            }
            Err(e) => {
                warn!("Failed to load owning metadata {}: {}", metadata_path, e);
                None
            }
        }
    }

    fn extract(&self, metadata_path: &str, document: &MetadataDocument) -> FieldMap {
        self.extractor.extract(metadata_path, document)
    }

    async fn apply_update_with_metadata(
        &self,
        binary_path: &str,
        fields: &FieldMap,
        status: &mut UpdateStatus,
    ) {
        let is_remote = self.classifier.is_remote(binary_path);
        let content = match self.content.resolve(binary_path, is_remote).await {
            Some(content) => content,
            None => {
                debug!("Indexing {} with empty content", binary_path);
                Content::empty()
            }
        };

        match self
            .writer
            .update_with_metadata(binary_path, content, fields)
            .await
        {
            Ok(()) => {
                debug!("Indexed {} with metadata", binary_path);
                status.add_successful_update(binary_path);
            }
            Err(e) => {
                warn!("Failed to index {} with metadata: {}", binary_path, e);
                status.add_failed_update(binary_path);
            }
        }
    }

    async fn apply_update_standalone(&self, binary_path: &str, status: &mut UpdateStatus) {
        let is_remote = self.classifier.is_remote(binary_path);
        let Some(content) = self.content.resolve(binary_path, is_remote).await else {
            info!("Skipping standalone update of {}: no content", binary_path);
            return;
        };

        match self.writer.update_standalone(binary_path, content).await {
            Ok(()) => {
                debug!("Indexed {} standalone", binary_path);
                status.add_successful_update(binary_path);
            }
            Err(e) => {
                warn!("Failed to index {} standalone: {}", binary_path, e);
                status.add_failed_update(binary_path);
            }
        }
    }

    async fn apply_delete(&self, path: &str, status: &mut UpdateStatus) {
        match self.writer.delete(path).await {
            Ok(()) => {
                debug!("Deleted {} from index", path);
                status.add_successful_delete(path);
            }
            Err(e) => {
                warn!("Failed to delete {} from index: {}", path, e);
                status.add_failed_delete(path);
            }
        }
    }
}

#[async_trait]
impl BatchIndexer for MetadataBinaryIndexer {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn update_index(
        &self,
        update_set: &UpdateSet,
        status: &mut UpdateStatus,
    ) -> Result<(), SyncError> {
        MetadataBinaryIndexer::update_index(self, update_set, status).await
    }
}
