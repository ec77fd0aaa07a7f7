//! Collaborator seams of the sync engine
//!
//! The engine never talks to storage directly. It reads through a [`ContentRepository`],
//! optionally fetches remote binaries through a [`RemoteFileResolver`], asks the index
//! for previous associations through [`IndexLookup`] and applies decisions through
//! [`IndexWriter`].

pub mod fs_repository;
pub mod memory_index;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{IndexError, RepositoryError};
use crate::metadata::MetadataDocument;
use crate::models::{Content, FieldMap};

pub use fs_repository::FsContentRepository;
pub use memory_index::{IndexedDocument, MemoryIndex};

/// Read access to the content repository
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Load and parse a metadata document. `Ok(None)` when the file does not exist.
    async fn get_document(&self, path: &str) -> Result<Option<MetadataDocument>, RepositoryError>;

    /// Read a file. `Ok(None)` when the file does not exist.
    async fn get_content(&self, path: &str) -> Result<Option<Content>, RepositoryError>;

    /// Size of a file in bytes. `Ok(None)` when the file does not exist.
    async fn content_length(&self, path: &str) -> Result<Option<u64>, RepositoryError>;
}

/// A binary stored outside the repository
#[async_trait]
pub trait RemoteFile: Send + Sync {
    fn path(&self) -> &str;

    fn last_modified(&self) -> Option<DateTime<Utc>>;

    async fn read_all(&self) -> Result<Vec<u8>, RepositoryError>;
}

/// Resolves remote binary paths to their backing store
#[async_trait]
pub trait RemoteFileResolver: Send + Sync {
    async fn resolve(&self, path: &str) -> Result<Option<Box<dyn RemoteFile>>, RepositoryError>;
}

/// Reverse lookups answered by the index itself
#[async_trait]
pub trait IndexLookup: Send + Sync {
    /// Binaries whose records currently carry `metadata_path` in the metadata path field
    async fn binaries_for_metadata(&self, metadata_path: &str) -> Result<Vec<String>, IndexError>;

    /// Metadata path recorded on the binary's record, if any
    async fn metadata_for_binary(&self, binary_path: &str) -> Result<Option<String>, IndexError>;
}

/// Index write operations. Each call commits on its own; writes must be visible to
/// [`IndexLookup`] once the call returns.
#[async_trait]
pub trait IndexWriter: Send + Sync {
    async fn update_with_metadata(
        &self,
        path: &str,
        content: Content,
        fields: &FieldMap,
    ) -> Result<(), IndexError>;

    async fn update_standalone(&self, path: &str, content: Content) -> Result<(), IndexError>;

    async fn delete(&self, path: &str) -> Result<(), IndexError>;
}
