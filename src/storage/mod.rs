//! Object storage module
//!
//! The redirect handler reaches the object store only through the two traits here:
//! - `StorageProvider` builds a region-scoped client from the ambient environment
//! - `ObjectStorage` answers existence checks and issues presigned GET URLs
//!
//! `s3` holds the AWS SDK implementation.

#[cfg(test)]
pub mod fake;
pub mod s3;

use async_trait::async_trait;
use hyper::StatusCode;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use s3::S3Provider;

/// Bucket and key addressed by a request's `object` parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocator {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocator {
    /// Split `bucket/key...` on the first `/`.
    ///
    /// Everything after the first separator is the key, so `a/b/c` gives
    /// bucket `a` and key `b/c`. Input without a separator yields an empty key.
    pub fn parse(object: &str) -> Self {
        match object.split_once('/') {
            Some((bucket, key)) => Self {
                bucket: bucket.to_string(),
                key: key.to_string(),
            },
            None => Self {
                bucket: object.to_string(),
                key: String::new(),
            },
        }
    }

    /// Whether both halves are non-empty and worth asking storage about
    pub fn is_addressable(&self) -> bool {
        !self.bucket.is_empty() && !self.key.is_empty()
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// Failures of the storage collaborator, classified by what the caller should see
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid region: {0:?}")]
    InvalidRegion(String),

    #[error("credential resolution failed: {0}")]
    Credentials(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage call timed out: {0}")]
    Timeout(String),

    #[error("storage unreachable: {0}")]
    Unavailable(String),

    #[error("failed to build storage request: {0}")]
    Request(String),

    #[error("failed to presign URL: {0}")]
    Presign(String),
}

impl StorageError {
    /// HTTP status returned to the client for this failure
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable(_) => StatusCode::BAD_GATEWAY,
            Self::InvalidRegion(_)
            | Self::Credentials(_)
            | Self::Request(_)
            | Self::Presign(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A storage client bound to one region
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Succeeds only if the object exists and is visible to the resolved credentials
    async fn exists(&self, locator: &ObjectLocator) -> Result<(), StorageError>;

    /// Issue a GET URL valid for `expires_in`
    async fn presign_get(
        &self,
        locator: &ObjectLocator,
        expires_in: Duration,
    ) -> Result<String, StorageError>;
}

/// Resolves a region-scoped `ObjectStorage` for each request
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn connect(&self, region: &str) -> Result<Box<dyn ObjectStorage>, StorageError>;
}
