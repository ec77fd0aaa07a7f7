use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::adapters::ContentRepository;
use crate::error::RepositoryError;
use crate::metadata::MetadataDocument;
use crate::models::Content;

/// Content repository backed by a local directory. Repository path `/a/b.pdf`
/// maps to `<root>/a/b.pdf`.
#[derive(Debug, Clone)]
pub struct FsContentRepository {
    root: PathBuf,
}

impl FsContentRepository {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(RepositoryError::RootNotFound(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, RepositoryError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(RepositoryError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn read(&self, path: &str) -> Result<Option<(Vec<u8>, DateTime<Utc>)>, RepositoryError> {
        let file = self.resolve(path)?;

        let bytes = match fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} not found in repository", path);
                return Ok(None);
            }
            Err(source) => {
                return Err(RepositoryError::Io {
                    path: path.to_string(),
                    source,
                })
            }
        };

        let modified = fs::metadata(&file)
            .await
            .and_then(|m| m.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Some((bytes, modified)))
    }
}

#[async_trait]
impl ContentRepository for FsContentRepository {
    async fn get_document(&self, path: &str) -> Result<Option<MetadataDocument>, RepositoryError> {
        match self.read(path).await? {
            Some((bytes, _)) => MetadataDocument::parse(path, &bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn get_content(&self, path: &str) -> Result<Option<Content>, RepositoryError> {
        Ok(self
            .read(path)
            .await?
            .map(|(bytes, modified)| Content::new(bytes, modified)))
    }

    async fn content_length(&self, path: &str) -> Result<Option<u64>, RepositoryError> {
        let file = self.resolve(path)?;
        match fs::metadata(&file).await {
            Ok(metadata) if metadata.is_file() => Ok(Some(metadata.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(RepositoryError::Io {
                path: path.to_string(),
                source,
            }),
        }
    }
}
