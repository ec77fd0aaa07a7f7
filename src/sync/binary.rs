use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::adapters::{ContentRepository, IndexWriter, RemoteFileResolver};
use crate::classify::PathClassifier;
use crate::config::ResolvedSyncConfig;
use crate::error::{ConfigError, SyncError};
use crate::models::UpdateSet;
use crate::status::UpdateStatus;
use crate::sync::content::ContentResolver;
use crate::sync::BatchIndexer;

/// Indexes binaries on their own, without looking at metadata.
///
/// Paths must pass the include/exclude gate and have a supported content type.
/// Files over the configured size limit are skipped without being recorded.
pub struct BinaryBatchIndexer {
    classifier: Arc<PathClassifier>,
    repository: Arc<dyn ContentRepository>,
    writer: Arc<dyn IndexWriter>,
    content: ContentResolver,
    max_size_bytes: u64,
}

impl BinaryBatchIndexer {
    pub fn new(
        config: &ResolvedSyncConfig,
        repository: Arc<dyn ContentRepository>,
        writer: Arc<dyn IndexWriter>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            classifier: Arc::new(config.classifier()?),
            content: ContentResolver::new(repository.clone()),
            repository,
            writer,
            max_size_bytes: config.max_binary_size_bytes,
        })
    }

    pub fn with_remote_resolver(mut self, resolver: Arc<dyn RemoteFileResolver>) -> Self {
        self.content = self.content.with_remote(resolver);
        self
    }

    fn accepts(&self, path: &str) -> bool {
        self.classifier.is_included(path) && self.classifier.is_supported_type(path)
    }

    async fn exceeds_size_limit(&self, path: &str) -> Option<bool> {
        match self.repository.content_length(path).await {
            Ok(Some(length)) => Some(length > self.max_size_bytes),
            Ok(None) => None,
            Err(e) => {
                debug!("Could not stat {}: {}", path, e);
                None
            }
        }
    }

    pub async fn update_index(
        &self,
        update_set: &UpdateSet,
        status: &mut UpdateStatus,
    ) -> Result<(), SyncError> {
        for path in &update_set.update_paths {
            if !self.accepts(path) {
                debug!("Ignoring binary update {}", path);
                continue;
            }

            if self.exceeds_size_limit(path).await == Some(true) {
                info!(
                    "Skipping {}: larger than {} bytes",
                    path, self.max_size_bytes
                );
                continue;
            }

            let is_remote = self.classifier.is_remote(path);
            let Some(content) = self.content.resolve(path, is_remote).await else {
                info!("Skipping {}: no content", path);
                continue;
            };

            // Remote content is only sized once fetched
            if content.len() > self.max_size_bytes {
                info!(
                    "Skipping {}: larger than {} bytes",
                    path, self.max_size_bytes
                );
                continue;
            }

            match self.writer.update_standalone(path, content).await {
                Ok(()) => status.add_successful_update(path.as_str()),
                Err(e) => {
                    warn!("Failed to index {}: {}", path, e);
                    status.add_failed_update(path.as_str());
                }
            }
        }

        for path in &update_set.delete_paths {
            if !self.accepts(path) {
                debug!("Ignoring binary delete {}", path);
                continue;
            }

            match self.writer.delete(path).await {
                Ok(()) => status.add_successful_delete(path.as_str()),
                Err(e) => {
                    warn!("Failed to delete {} from index: {}", path, e);
                    status.add_failed_delete(path.as_str());
                }
            }
        }

        info!("Binary sync finished: {}", status);
        Ok(())
    }
}

#[async_trait]
impl BatchIndexer for BinaryBatchIndexer {
    fn name(&self) -> &'static str {
        "binary"
    }

    async fn update_index(
        &self,
        update_set: &UpdateSet,
        status: &mut UpdateStatus,
    ) -> Result<(), SyncError> {
        BinaryBatchIndexer::update_index(self, update_set, status).await
    }
}
