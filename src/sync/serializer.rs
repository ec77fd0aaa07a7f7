use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::SyncError;
use crate::models::UpdateSet;
use crate::status::UpdateStatus;
use crate::sync::BatchIndexer;

/// Runs sync cycles of the same site one at a time.
///
/// A cycle reads associations written by the previous cycle, so two overlapping cycles
/// on one site could both see stale associations. Cycles of different sites do not
/// share index records and run concurrently.
#[derive(Debug, Default)]
pub struct CycleSerializer {
    sites: DashMap<String, Arc<Mutex<()>>>,
}

impl CycleSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other cycle holds `site`
    pub async fn lock(&self, site: &str) -> OwnedMutexGuard<()> {
        let mutex = self
            .sites
            .entry(site.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    pub async fn run(
        &self,
        site: &str,
        indexer: &dyn BatchIndexer,
        update_set: &UpdateSet,
        status: &mut UpdateStatus,
    ) -> Result<(), SyncError> {
        let _guard = self.lock(site).await;
        debug!("Running {} sync cycle for site {}", indexer.name(), site);
        indexer.update_index(update_set, status).await
    }

    pub fn site_count(&self) -> usize {
        self.sites.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct SlowIndexer {
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    #[async_trait]
    impl BatchIndexer for SlowIndexer {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn update_index(
            &self,
            update_set: &UpdateSet,
            status: &mut UpdateStatus,
        ) -> Result<(), SyncError> {
            let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            for path in &update_set.update_paths {
                status.add_successful_update(path.as_str());
            }
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_site_cycles_do_not_overlap() {
        let serializer = Arc::new(CycleSerializer::new());
        let indexer = Arc::new(SlowIndexer::default());

        let mut handles = Vec::new();
        for i in 0..4 {
            let serializer = serializer.clone();
            let indexer = indexer.clone();
            handles.push(tokio::spawn(async move {
                let mut status = UpdateStatus::new();
                let set = UpdateSet::updates([format!("/static-assets/{i}.pdf")]);
                serializer
                    .run("site", indexer.as_ref(), &set, &mut status)
                    .await
                    .unwrap();
                status
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().successful_updates().len(), 1);
        }
        assert_eq!(indexer.max_running.load(Ordering::SeqCst), 1);
        assert_eq!(serializer.site_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_different_sites_run_concurrently() {
        let serializer = Arc::new(CycleSerializer::new());
        let indexer = Arc::new(SlowIndexer::default());

        let guard_a = serializer.lock("a").await;
        let mut status = UpdateStatus::new();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            serializer.run("b", indexer.as_ref(), &UpdateSet::default(), &mut status),
        )
        .await;
        assert!(result.is_ok());
        drop(guard_a);
        assert_eq!(serializer.site_count(), 2);
    }
}
