//! Bucket-emptying routine.
//!
//! Stack deletion fails while any object (or, on versioned buckets, any
//! historical version or delete marker) remains, so the drain must be
//! complete: it pages through the bucket, batch-deleting each page, until
//! the store stops returning a continuation token. Any listing or
//! deletion error aborts the whole drain and propagates to the caller.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, info};

use crate::error::{Result, StackPilotError, StoreError};

use super::client::{ObjectStore, StoreObject, DELETE_BATCH_SIZE};

/// Drains every object from a bucket prior to stack deletion.
pub struct BucketDrainer {
    /// Object store.
    store: Arc<dyn ObjectStore>,
}

impl BucketDrainer {
    /// Creates a drainer.
    #[must_use]
    pub const fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Drains the bucket completely.
    ///
    /// A missing bucket resolves successfully (nothing to empty). An
    /// already-empty bucket issues zero delete calls.
    ///
    /// # Errors
    ///
    /// Returns an error if any listing or deletion call fails; partial
    /// drains are never silently accepted.
    pub async fn drain(&self, bucket: &str) -> Result<()> {
        // Versioning is queried once, up front.
        let versioned = match self.store.bucket_versioning(bucket).await {
            Ok(versioned) => versioned,
            Err(StackPilotError::Store(StoreError::BucketNotFound { .. })) => {
                debug!("Bucket {bucket} does not exist, nothing to drain");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        info!("Draining bucket {bucket} (versioned: {versioned})");
        let mut token: Option<String> = None;
        let mut total: usize = 0;

        loop {
            let page = match self.store.list_page(bucket, token.as_deref()).await {
                Ok(page) => page,
                Err(StackPilotError::Store(StoreError::BucketNotFound { .. })) => {
                    debug!("Bucket {bucket} disappeared mid-drain");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            if !page.keys.is_empty() {
                if versioned {
                    total += self.delete_versions(bucket, &page.keys).await?;
                } else {
                    let objects: Vec<StoreObject> =
                        page.keys.iter().map(StoreObject::new).collect();
                    self.store.delete_batch(bucket, &objects).await?;
                    total += objects.len();
                }
            }

            token = page.next_token;
            if token.is_none() {
                break;
            }
        }

        info!("Drained {total} object(s) from bucket {bucket}");
        Ok(())
    }

    /// Enumerates and deletes the full version history of the given keys.
    ///
    /// Version listing is key-prefix-scoped, so each key gets its own
    /// listing loop; collected versions are batch-deleted with the
    /// independent batches joined concurrently.
    async fn delete_versions(&self, bucket: &str, keys: &[String]) -> Result<usize> {
        let mut victims: Vec<StoreObject> = Vec::new();

        for key in keys {
            let mut token = None;
            loop {
                let page = self
                    .store
                    .list_versions_page(bucket, key, token.as_ref())
                    .await?;
                // Prefix-scoped listing can surface sibling keys from the
                // same page; keep exact matches only to avoid double
                // deletion.
                victims.extend(page.versions.into_iter().filter(|v| v.key == *key));
                token = page.next_token;
                if token.is_none() {
                    break;
                }
            }
        }

        let deleted = victims.len();
        let batches: Vec<_> = victims
            .chunks(DELETE_BATCH_SIZE)
            .map(|batch| self.store.delete_batch(bucket, batch))
            .collect();
        try_join_all(batches).await?;

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fake::FakeObjectStore;

    fn keys(count: usize, start: usize) -> Vec<String> {
        (start..start + count).map(|i| format!("obj-{i}")).collect()
    }

    #[tokio::test]
    async fn empty_bucket_issues_zero_delete_calls() {
        let store = Arc::new(FakeObjectStore::new());
        let drainer = BucketDrainer::new(store.clone());

        drainer.drain("infra-bucket").await.expect("drain failed");

        assert!(store.delete_calls().is_empty());
        assert_eq!(store.list_calls().len(), 1);
    }

    #[tokio::test]
    async fn pages_until_no_continuation_token() {
        let store = Arc::new(FakeObjectStore::new());
        let page1 = keys(1000, 0);
        let page2 = keys(1000, 1000);
        let page3 = keys(42, 2000);
        store.push_page(
            "infra-bucket",
            &page1.iter().map(String::as_str).collect::<Vec<_>>(),
            Some("t1"),
        );
        store.push_page(
            "infra-bucket",
            &page2.iter().map(String::as_str).collect::<Vec<_>>(),
            Some("t2"),
        );
        store.push_page(
            "infra-bucket",
            &page3.iter().map(String::as_str).collect::<Vec<_>>(),
            None,
        );

        let drainer = BucketDrainer::new(store.clone());
        drainer.drain("infra-bucket").await.expect("drain failed");

        // Three pages of 1000/1000/42: exactly three list calls and three
        // batched delete calls.
        assert_eq!(store.list_calls().len(), 3);
        let deletes = store.delete_calls();
        assert_eq!(deletes.len(), 3);
        assert_eq!(deletes[0].1.len(), 1000);
        assert_eq!(deletes[1].1.len(), 1000);
        assert_eq!(deletes[2].1.len(), 42);
    }

    #[tokio::test]
    async fn missing_bucket_is_benign() {
        let store = Arc::new(FakeObjectStore::new());
        store.mark_missing("gone-bucket");

        let drainer = BucketDrainer::new(store.clone());
        drainer
            .drain("gone-bucket")
            .await
            .expect("missing bucket must resolve successfully");

        assert!(store.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn listing_failure_aborts_the_drain() {
        let store = Arc::new(FakeObjectStore::new());
        store.fail_listing("broken-bucket");

        let drainer = BucketDrainer::new(store.clone());
        let err = drainer
            .drain("broken-bucket")
            .await
            .expect_err("failure must propagate");

        assert!(matches!(
            err,
            StackPilotError::Store(StoreError::Api { .. })
        ));
        assert!(store.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn versioned_drain_enumerates_history_per_key() {
        let store = Arc::new(FakeObjectStore::new());
        store.set_versioned("logs-bucket");
        store.push_page("logs-bucket", &["a.log", "b.log"], None);
        store.push_version_page(
            "logs-bucket",
            "a.log",
            vec![
                StoreObject::versioned("a.log", "v1"),
                StoreObject::versioned("a.log", "v2"),
            ],
            None,
        );
        store.push_version_page(
            "logs-bucket",
            "b.log",
            vec![StoreObject::versioned("b.log", "v1")],
            None,
        );

        let drainer = BucketDrainer::new(store.clone());
        drainer.drain("logs-bucket").await.expect("drain failed");

        // One version listing per discovered key.
        assert_eq!(
            store.version_list_calls(),
            vec![
                (String::from("logs-bucket"), String::from("a.log")),
                (String::from("logs-bucket"), String::from("b.log")),
            ]
        );

        let deleted: Vec<StoreObject> = store
            .delete_calls()
            .into_iter()
            .flat_map(|(_, objects)| objects)
            .collect();
        assert_eq!(deleted.len(), 3);
        assert!(deleted.iter().all(|o| o.version_id.is_some()));
    }

    #[tokio::test]
    async fn versioned_drain_ignores_prefix_siblings() {
        let store = Arc::new(FakeObjectStore::new());
        store.set_versioned("logs-bucket");
        store.push_page("logs-bucket", &["app"], None);
        // Prefix listing for "app" also surfaces "app.bak".
        store.push_version_page(
            "logs-bucket",
            "app",
            vec![
                StoreObject::versioned("app", "v1"),
                StoreObject::versioned("app.bak", "v1"),
            ],
            None,
        );

        let drainer = BucketDrainer::new(store.clone());
        drainer.drain("logs-bucket").await.expect("drain failed");

        let deleted: Vec<StoreObject> = store
            .delete_calls()
            .into_iter()
            .flat_map(|(_, objects)| objects)
            .collect();
        assert_eq!(deleted, vec![StoreObject::versioned("app", "v1")]);
    }
}
