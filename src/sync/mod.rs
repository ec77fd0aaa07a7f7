//! Sync cycles
//!
//! A cycle takes the set of paths changed since the previous sync of a site and brings
//! the index in line with the repository. [`MetadataBinaryIndexer`] keeps binaries
//! paired with the metadata that references them; [`BinaryBatchIndexer`] indexes
//! binaries on their own.

pub mod binary;
pub mod content;
pub mod engine;
pub mod serializer;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::models::UpdateSet;
use crate::status::UpdateStatus;

pub use binary::BinaryBatchIndexer;
pub use content::ContentResolver;
pub use engine::MetadataBinaryIndexer;
pub use serializer::CycleSerializer;

/// A batch indexer run once per sync cycle
#[async_trait]
pub trait BatchIndexer: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Apply `update_set` to the index, recording per-path outcomes in `status`
    async fn update_index(
        &self,
        update_set: &UpdateSet,
        status: &mut UpdateStatus,
    ) -> Result<(), SyncError>;
}
