//! In-memory storage used by handler and server tests

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{ObjectLocator, ObjectStorage, StorageError, StorageProvider};

/// Failure injected into the fake backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Failure {
    #[default]
    None,
    Connect,
    Transport,
    SlowHead,
    Presign,
    Panic,
}

#[derive(Default)]
pub struct FakeBackend {
    objects: HashSet<String>,
    failure: Failure,
    /// Operations in call order, e.g. `connect us-east-1`, `head b/k`
    calls: Mutex<Vec<String>>,
    presigned: AtomicUsize,
}

impl FakeBackend {
    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

/// `StorageProvider` over a shared `FakeBackend`
#[derive(Clone, Default)]
pub struct FakeProvider {
    backend: Arc<FakeBackend>,
}

impl FakeProvider {
    pub fn with_objects(objects: &[&str]) -> Self {
        Self::failing(objects, Failure::None)
    }

    pub fn failing(objects: &[&str], failure: Failure) -> Self {
        Self {
            backend: Arc::new(FakeBackend {
                objects: objects.iter().map(ToString::to_string).collect(),
                failure,
                ..FakeBackend::default()
            }),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.backend
            .calls
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn presign_count(&self) -> usize {
        self.backend.presigned.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageProvider for FakeProvider {
    async fn connect(&self, region: &str) -> Result<Box<dyn ObjectStorage>, StorageError> {
        self.backend.record(format!("connect {region}"));
        if region.is_empty() {
            return Err(StorageError::InvalidRegion(region.to_string()));
        }
        match self.backend.failure {
            Failure::Connect => Err(StorageError::Credentials("no credentials".to_string())),
            Failure::Panic => panic!("storage provider exploded"),
            _ => Ok(Box::new(FakeStorage {
                backend: Arc::clone(&self.backend),
                region: region.to_string(),
            })),
        }
    }
}

struct FakeStorage {
    backend: Arc<FakeBackend>,
    region: String,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn exists(&self, locator: &ObjectLocator) -> Result<(), StorageError> {
        self.backend.record(format!("head {locator}"));
        match self.backend.failure {
            Failure::Transport => Err(StorageError::Unavailable("connection refused".to_string())),
            Failure::SlowHead => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
            _ if self.backend.objects.contains(&locator.to_string()) => Ok(()),
            _ => Err(StorageError::NotFound(locator.to_string())),
        }
    }

    async fn presign_get(
        &self,
        locator: &ObjectLocator,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        self.backend.record(format!("presign {locator}"));
        if self.backend.failure == Failure::Presign {
            return Err(StorageError::Presign("signing key unavailable".to_string()));
        }
        let n = self.backend.presigned.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://{}.s3.{}.amazonaws.com/{}?X-Amz-Expires={}&X-Amz-Signature=sig{n}",
            locator.bucket,
            self.region,
            locator.key,
            expires_in.as_secs()
        ))
    }
}
