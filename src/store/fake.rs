//! Scripted [`ObjectStore`] fake for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, StoreError};

use super::client::{ObjectPage, ObjectStore, StoreObject, VersionPage, VersionToken};

/// Scripted store: listing pops queued pages per bucket (empty page once
/// the queue runs dry), deletes and puts are recorded for assertions.
#[derive(Default)]
pub(crate) struct FakeObjectStore {
    versioned_buckets: Mutex<HashSet<String>>,
    missing_buckets: Mutex<HashSet<String>>,
    failing_buckets: Mutex<HashSet<String>>,
    pages: Mutex<HashMap<String, VecDeque<ObjectPage>>>,
    version_pages: Mutex<HashMap<(String, String), VecDeque<VersionPage>>>,

    list_calls: Mutex<Vec<String>>,
    version_list_calls: Mutex<Vec<(String, String)>>,
    delete_calls: Mutex<Vec<(String, Vec<StoreObject>)>>,
    put_calls: Mutex<Vec<(String, String)>>,
}

impl FakeObjectStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_versioned(&self, bucket: &str) {
        self.versioned_buckets
            .lock()
            .expect("lock poisoned")
            .insert(bucket.to_string());
    }

    pub(crate) fn mark_missing(&self, bucket: &str) {
        self.missing_buckets
            .lock()
            .expect("lock poisoned")
            .insert(bucket.to_string());
    }

    pub(crate) fn fail_listing(&self, bucket: &str) {
        self.failing_buckets
            .lock()
            .expect("lock poisoned")
            .insert(bucket.to_string());
    }

    pub(crate) fn push_page(&self, bucket: &str, keys: &[&str], next_token: Option<&str>) {
        self.pages
            .lock()
            .expect("lock poisoned")
            .entry(bucket.to_string())
            .or_default()
            .push_back(ObjectPage {
                keys: keys.iter().map(ToString::to_string).collect(),
                next_token: next_token.map(ToString::to_string),
            });
    }

    pub(crate) fn push_version_page(
        &self,
        bucket: &str,
        key: &str,
        versions: Vec<StoreObject>,
        next_token: Option<VersionToken>,
    ) {
        self.version_pages
            .lock()
            .expect("lock poisoned")
            .entry((bucket.to_string(), key.to_string()))
            .or_default()
            .push_back(VersionPage {
                versions,
                next_token,
            });
    }

    pub(crate) fn list_calls(&self) -> Vec<String> {
        self.list_calls.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn version_list_calls(&self) -> Vec<(String, String)> {
        self.version_list_calls
            .lock()
            .expect("lock poisoned")
            .clone()
    }

    pub(crate) fn delete_calls(&self) -> Vec<(String, Vec<StoreObject>)> {
        self.delete_calls.lock().expect("lock poisoned").clone()
    }

    pub(crate) fn put_calls(&self) -> Vec<(String, String)> {
        self.put_calls.lock().expect("lock poisoned").clone()
    }

    fn check_bucket(&self, bucket: &str) -> Result<()> {
        if self
            .missing_buckets
            .lock()
            .expect("lock poisoned")
            .contains(bucket)
        {
            return Err(StoreError::BucketNotFound {
                bucket: bucket.to_string(),
            }
            .into());
        }
        if self
            .failing_buckets
            .lock()
            .expect("lock poisoned")
            .contains(bucket)
        {
            return Err(StoreError::api(format!("injected failure for {bucket}")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FakeObjectStore {
    async fn bucket_versioning(&self, bucket: &str) -> Result<bool> {
        self.check_bucket(bucket)?;
        Ok(self
            .versioned_buckets
            .lock()
            .expect("lock poisoned")
            .contains(bucket))
    }

    async fn list_page(&self, bucket: &str, _token: Option<&str>) -> Result<ObjectPage> {
        self.check_bucket(bucket)?;
        self.list_calls
            .lock()
            .expect("lock poisoned")
            .push(bucket.to_string());

        Ok(self
            .pages
            .lock()
            .expect("lock poisoned")
            .get_mut(bucket)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default())
    }

    async fn list_versions_page(
        &self,
        bucket: &str,
        key_prefix: &str,
        _token: Option<&VersionToken>,
    ) -> Result<VersionPage> {
        self.check_bucket(bucket)?;
        self.version_list_calls
            .lock()
            .expect("lock poisoned")
            .push((bucket.to_string(), key_prefix.to_string()));

        Ok(self
            .version_pages
            .lock()
            .expect("lock poisoned")
            .get_mut(&(bucket.to_string(), key_prefix.to_string()))
            .and_then(VecDeque::pop_front)
            .unwrap_or_default())
    }

    async fn delete_batch(&self, bucket: &str, objects: &[StoreObject]) -> Result<()> {
        self.check_bucket(bucket)?;
        self.delete_calls
            .lock()
            .expect("lock poisoned")
            .push((bucket.to_string(), objects.to_vec()));
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, _body: Vec<u8>) -> Result<()> {
        self.check_bucket(bucket)?;
        self.put_calls
            .lock()
            .expect("lock poisoned")
            .push((bucket.to_string(), key.to_string()));
        Ok(())
    }
}
