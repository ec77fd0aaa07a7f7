//! index-sync keeps a search index in step with a content repository.
//!
//! Given the paths changed since the previous sync of a site, it indexes binaries
//! together with the metadata descriptors that reference them, falls back to
//! standalone indexing when a binary loses its metadata, and removes child binaries
//! whose owner is gone.

pub mod adapters;
pub mod classify;
pub mod config;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod models;
pub mod status;
pub mod sync;

// Re-export commonly used types for convenience
pub use classify::{Classification, PathClassifier};
pub use config::{ResolvedSyncConfig, SyncConfig};
pub use error::{ConfigError, IndexError, RepositoryError, SyncError};
pub use metadata::{MetadataDocument, MetadataExtractor};
pub use models::{Content, FieldMap, UpdateSet};
pub use status::UpdateStatus;
pub use sync::{BatchIndexer, BinaryBatchIndexer, CycleSerializer, MetadataBinaryIndexer};
