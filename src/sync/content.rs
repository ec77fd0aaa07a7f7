use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::adapters::{ContentRepository, RemoteFileResolver};
use crate::models::Content;

/// Resolves binary bytes: remote store first for remote binaries, then the repository.
/// Read failures are logged and reported as missing content.
#[derive(Clone)]
pub struct ContentResolver {
    repository: Arc<dyn ContentRepository>,
    remote: Option<Arc<dyn RemoteFileResolver>>,
}

impl ContentResolver {
    pub fn new(repository: Arc<dyn ContentRepository>) -> Self {
        Self {
            repository,
            remote: None,
        }
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteFileResolver>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub async fn resolve(&self, path: &str, is_remote: bool) -> Option<Content> {
        if is_remote {
            if let Some(remote) = &self.remote {
                if let Some(content) = self.resolve_remote(remote.as_ref(), path).await {
                    return Some(content);
                }
            }
        }

        match self.repository.get_content(path).await {
            Ok(Some(content)) => Some(content),
            Ok(None) => {
                debug!("No content found for {}", path);
                None
            }
            Err(e) => {
                warn!("Failed to read content for {}: {}", path, e);
                None
            }
        }
    }

    async fn resolve_remote(&self, remote: &dyn RemoteFileResolver, path: &str) -> Option<Content> {
        let file = match remote.resolve(path).await {
            Ok(Some(file)) => file,
            Ok(None) => {
                debug!("Remote resolver has no file for {}", path);
                return None;
            }
            Err(e) => {
                warn!("Failed to resolve remote file {}: {}", path, e);
                return None;
            }
        };

        match file.read_all().await {
            Ok(bytes) => Some(Content::new(
                bytes,
                file.last_modified().unwrap_or_else(Utc::now),
            )),
            Err(e) => {
                warn!("Failed to read remote file {}: {}", file.path(), e);
                None
            }
        }
    }
}

impl std::fmt::Debug for ContentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentResolver")
            .field("remote", &self.remote.is_some())
            .finish()
    }
}
