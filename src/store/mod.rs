//! Object-store integration: S3-shaped client seam and the
//! bucket-emptying routine run before stack deletion.

pub mod client;
pub mod drain;

#[cfg(test)]
pub(crate) mod fake;

pub use client::{
    ObjectPage, ObjectStore, S3ObjectStore, StoreObject, VersionPage, VersionToken,
    DELETE_BATCH_SIZE, LIST_PAGE_SIZE,
};
pub use drain::BucketDrainer;
