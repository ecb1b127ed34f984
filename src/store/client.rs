//! Object-store client.
//!
//! This module defines the [`ObjectStore`] seam for the S3-shaped API the
//! drainer and template staging depend on, plus the production
//! implementation backed by `aws-sdk-s3`. Listing and deletion are bounded
//! by the store's fixed per-call limits (1000 keys per page, 1000 objects
//! per delete batch).

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::types::{BucketVersioningStatus, Delete, ObjectIdentifier};
use tracing::debug;

use crate::error::{Result, StoreError};

/// Maximum keys returned per listing page.
pub const LIST_PAGE_SIZE: i32 = 1000;

/// Maximum objects per batched delete call.
pub const DELETE_BATCH_SIZE: usize = 1000;

/// An object (or object version) in a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreObject {
    /// Object key.
    pub key: String,
    /// Version id, for versioned deletion.
    pub version_id: Option<String>,
}

impl StoreObject {
    /// Creates an unversioned object reference.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: None,
        }
    }

    /// Creates a versioned object reference.
    #[must_use]
    pub fn versioned(key: impl Into<String>, version_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            version_id: Some(version_id.into()),
        }
    }
}

/// One page of an object listing.
#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    /// Object keys on this page.
    pub keys: Vec<String>,
    /// Token for the next page, if any.
    pub next_token: Option<String>,
}

/// Continuation token for version listing (key marker + version marker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken {
    /// Key to continue after.
    pub key_marker: String,
    /// Version id to continue after.
    pub version_id_marker: Option<String>,
}

/// One page of a version listing, including delete markers (a bucket is
/// only drained once both are gone).
#[derive(Debug, Clone, Default)]
pub struct VersionPage {
    /// Version records on this page.
    pub versions: Vec<StoreObject>,
    /// Token for the next page, if any.
    pub next_token: Option<VersionToken>,
}

/// Interface to the bucket-shaped object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether versioning is enabled on the bucket.
    async fn bucket_versioning(&self, bucket: &str) -> Result<bool>;

    /// Lists one page of object keys.
    async fn list_page(&self, bucket: &str, token: Option<&str>) -> Result<ObjectPage>;

    /// Lists one page of version records for keys under `key_prefix`.
    async fn list_versions_page(
        &self,
        bucket: &str,
        key_prefix: &str,
        token: Option<&VersionToken>,
    ) -> Result<VersionPage>;

    /// Deletes up to [`DELETE_BATCH_SIZE`] objects in one call.
    async fn delete_batch(&self, bucket: &str, objects: &[StoreObject]) -> Result<()>;

    /// Uploads an object (template staging).
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;
}

/// S3-backed [`ObjectStore`] implementation.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    /// SDK client.
    client: Client,
}

/// Whether a service error code marks the bucket itself as missing.
fn is_missing_bucket(code: Option<&str>) -> bool {
    code == Some("NoSuchBucket")
}

impl S3ObjectStore {
    /// Creates a store from a shared AWS configuration.
    #[must_use]
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(config),
        }
    }

    /// Creates a store from an existing SDK client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_versioning(&self, bucket: &str) -> Result<bool> {
        let result = self
            .client
            .get_bucket_versioning()
            .bucket(bucket)
            .send()
            .await;

        match result {
            Ok(output) => Ok(output.status() == Some(&BucketVersioningStatus::Enabled)),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if is_missing_bucket(service_err.code()) {
                    Err(StoreError::BucketNotFound {
                        bucket: bucket.to_string(),
                    }
                    .into())
                } else {
                    Err(StoreError::api(format!(
                        "get-bucket-versioning error: {service_err}"
                    ))
                    .into())
                }
            }
        }
    }

    async fn list_page(&self, bucket: &str, token: Option<&str>) -> Result<ObjectPage> {
        debug!("Listing objects in bucket {bucket}");

        let result = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .max_keys(LIST_PAGE_SIZE)
            .set_continuation_token(token.map(ToString::to_string))
            .send()
            .await;

        match result {
            Ok(output) => Ok(ObjectPage {
                keys: output
                    .contents()
                    .iter()
                    .filter_map(|o| o.key().map(ToString::to_string))
                    .collect(),
                next_token: output.next_continuation_token().map(ToString::to_string),
            }),
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if is_missing_bucket(service_err.code()) {
                    Err(StoreError::BucketNotFound {
                        bucket: bucket.to_string(),
                    }
                    .into())
                } else {
                    Err(StoreError::api(format!("list-objects error: {service_err}")).into())
                }
            }
        }
    }

    async fn list_versions_page(
        &self,
        bucket: &str,
        key_prefix: &str,
        token: Option<&VersionToken>,
    ) -> Result<VersionPage> {
        debug!("Listing versions for {key_prefix} in bucket {bucket}");

        let mut request = self
            .client
            .list_object_versions()
            .bucket(bucket)
            .prefix(key_prefix)
            .max_keys(LIST_PAGE_SIZE);

        if let Some(token) = token {
            request = request
                .key_marker(&token.key_marker)
                .set_version_id_marker(token.version_id_marker.clone());
        }

        let output = request.send().await.map_err(|e| {
            let service_err = e.into_service_error();
            if is_missing_bucket(service_err.code()) {
                StoreError::BucketNotFound {
                    bucket: bucket.to_string(),
                }
            } else {
                StoreError::api(format!("list-object-versions error: {service_err}"))
            }
        })?;

        let mut versions: Vec<StoreObject> = output
            .versions()
            .iter()
            .filter_map(|v| {
                let key = v.key()?;
                let version_id = v.version_id()?;
                Some(StoreObject::versioned(key, version_id))
            })
            .collect();

        // Delete markers count as versions; the bucket is not empty
        // until they are removed too.
        versions.extend(output.delete_markers().iter().filter_map(|m| {
            let key = m.key()?;
            let version_id = m.version_id()?;
            Some(StoreObject::versioned(key, version_id))
        }));

        let next_token = output.next_key_marker().map(|key_marker| VersionToken {
            key_marker: key_marker.to_string(),
            version_id_marker: output.next_version_id_marker().map(ToString::to_string),
        });

        Ok(VersionPage {
            versions,
            next_token,
        })
    }

    async fn delete_batch(&self, bucket: &str, objects: &[StoreObject]) -> Result<()> {
        debug!("Deleting {} object(s) from bucket {bucket}", objects.len());

        let identifiers = objects
            .iter()
            .map(|o| {
                ObjectIdentifier::builder()
                    .key(&o.key)
                    .set_version_id(o.version_id.clone())
                    .build()
                    .map_err(|e| StoreError::api(format!("invalid object identifier: {e}")))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .map_err(|e| StoreError::api(format!("invalid delete request: {e}")))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                StoreError::api(format!("delete-objects error: {service_err}"))
            })?;

        let errors = output.errors();
        if !errors.is_empty() {
            let first = errors
                .first()
                .and_then(|e| e.message())
                .unwrap_or("unknown failure");
            return Err(StoreError::BatchDeleteFailed {
                bucket: bucket.to_string(),
                failed: errors.len(),
                message: first.to_string(),
            }
            .into());
        }

        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        debug!("Uploading s3://{bucket}/{key}");

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body.into())
            .send()
            .await
            .map_err(|e| {
                let service_err = e.into_service_error();
                StoreError::api(format!("put-object error: {service_err}"))
            })?;

        Ok(())
    }
}
