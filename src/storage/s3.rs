//! S3 storage backend
//!
//! Clients are built per request from the default AWS provider chain
//! (environment, shared profile files, instance metadata) with the request's region.

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::time::Duration;

use super::{ObjectLocator, ObjectStorage, StorageError, StorageProvider};
use crate::config::StorageConfig;
use crate::logger;

/// Builds region-scoped S3 clients
#[derive(Debug, Clone, Default)]
pub struct S3Provider {
    endpoint_url: Option<String>,
    force_path_style: bool,
}

impl S3Provider {
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            endpoint_url: config.endpoint_url.clone(),
            force_path_style: config.force_path_style,
        }
    }

    /// S3 client with retries disabled and optional endpoint override
    fn client_from(&self, sdk_config: &SdkConfig) -> Client {
        let mut builder = aws_sdk_s3::config::Builder::from(sdk_config)
            .retry_config(RetryConfig::disabled())
            .force_path_style(self.force_path_style);
        if let Some(ref url) = self.endpoint_url {
            builder = builder.endpoint_url(url);
        }
        Client::from_conf(builder.build())
    }
}

#[async_trait]
impl StorageProvider for S3Provider {
    async fn connect(&self, region: &str) -> Result<Box<dyn ObjectStorage>, StorageError> {
        if region.trim().is_empty() {
            return Err(StorageError::InvalidRegion(region.to_string()));
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        // Resolve eagerly so a broken credential chain fails here, not at signing time
        let credentials = sdk_config.credentials_provider().ok_or_else(|| {
            StorageError::Credentials("no credentials provider configured".to_string())
        })?;
        credentials
            .provide_credentials()
            .await
            .map_err(|e| StorageError::Credentials(DisplayErrorContext(&e).to_string()))?;

        Ok(Box::new(S3Storage::new(self.client_from(&sdk_config))))
    }
}

/// `ObjectStorage` over an S3 client
pub struct S3Storage {
    client: Client,
}

impl S3Storage {
    pub const fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn exists(&self, locator: &ObjectLocator) -> Result<(), StorageError> {
        self.client
            .head_object()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| classify_head_error(&e, locator))
    }

    async fn presign_get(
        &self,
        locator: &ObjectLocator,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(expires_in)
            .map_err(|e| StorageError::Presign(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&locator.bucket)
            .key(&locator.key)
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(DisplayErrorContext(&e).to_string()))?;
        Ok(request.uri().to_string())
    }
}

/// Any answer from the service counts as "not found"; only local or transport
/// failures are reported differently.
fn classify_head_error(err: &SdkError<HeadObjectError>, locator: &ObjectLocator) -> StorageError {
    let detail = DisplayErrorContext(err).to_string();
    match err {
        SdkError::ServiceError(_) => {
            logger::log_debug(&format!("HeadObject {locator}: {detail}"));
            StorageError::NotFound(locator.to_string())
        }
        SdkError::TimeoutError(_) => StorageError::Timeout(detail),
        SdkError::ConstructionFailure(_) => StorageError::Request(detail),
        _ => StorageError::Unavailable(detail),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::config::timeout::TimeoutConfig;
    use aws_sdk_s3::config::{Credentials, Region as ClientRegion};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn static_config(
        endpoint_url: Option<&str>,
        force_path_style: bool,
    ) -> aws_sdk_s3::config::Builder {
        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(ClientRegion::new("us-east-1"))
            .credentials_provider(Credentials::new(
                "AKIDEXAMPLE",
                "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY",
                None,
                None,
                "static",
            ))
            .retry_config(RetryConfig::disabled())
            .force_path_style(force_path_style);
        if let Some(url) = endpoint_url {
            builder = builder.endpoint_url(url);
        }
        builder
    }

    fn static_client(endpoint_url: Option<&str>, force_path_style: bool) -> Client {
        Client::from_conf(static_config(endpoint_url, force_path_style).build())
    }

    /// Loopback endpoint answering every request with `reply`, or never when `None`
    async fn fake_endpoint(reply: Option<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let mut silent = Vec::new();
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0_u8; 4096];
                let _ = stream.read(&mut buf).await;
                match reply {
                    Some(reply) => {
                        let _ = stream.write_all(reply.as_bytes()).await;
                        let _ = stream.shutdown().await;
                    }
                    None => silent.push(stream),
                }
            }
        });
        format!("http://{addr}")
    }

    async fn head_against(endpoint: &str, timeout: Option<Duration>) -> Result<(), StorageError> {
        let mut builder = static_config(Some(endpoint), true);
        if let Some(limit) = timeout {
            builder =
                builder.timeout_config(TimeoutConfig::builder().operation_timeout(limit).build());
        }
        S3Storage::new(Client::from_conf(builder.build()))
            .exists(&locator())
            .await
    }

    fn locator() -> ObjectLocator {
        ObjectLocator::parse("my-bucket/path/to/file.txt")
    }

    #[tokio::test]
    async fn test_presign_virtual_hosted_url() {
        let storage = S3Storage::new(static_client(None, false));
        let url = storage
            .presign_get(&locator(), Duration::from_secs(3600))
            .await
            .expect("presign should succeed offline");

        assert!(
            url.starts_with("https://my-bucket.s3.us-east-1.amazonaws.com/path/to/file.txt?"),
            "unexpected url: {url}"
        );
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
        assert!(url.contains("X-Amz-Credential=AKIDEXAMPLE"));
    }

    #[tokio::test]
    async fn test_presign_path_style_url() {
        let storage = S3Storage::new(static_client(Some("http://localhost:9000"), true));
        let url = storage
            .presign_get(&locator(), Duration::from_secs(3600))
            .await
            .expect("presign should succeed offline");

        assert!(
            url.starts_with("http://localhost:9000/my-bucket/path/to/file.txt?"),
            "unexpected url: {url}"
        );
        assert!(url.contains("X-Amz-Expires=3600"));
    }

    #[tokio::test]
    async fn test_presign_is_not_memoized() {
        let storage = S3Storage::new(static_client(None, false));
        let first = storage
            .presign_get(&locator(), Duration::from_secs(3600))
            .await;
        let second = storage
            .presign_get(&locator(), Duration::from_secs(3600))
            .await;
        assert!(first.is_ok());
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_presign_rejects_excessive_expiry() {
        let storage = S3Storage::new(static_client(None, false));
        let result = storage
            .presign_get(&locator(), Duration::from_secs(8 * 24 * 3600))
            .await;
        assert!(matches!(result, Err(StorageError::Presign(_))));
    }

    #[tokio::test]
    async fn test_exists_unreachable_endpoint() {
        // Nothing listens on port 1, the connection is refused
        let storage = S3Storage::new(static_client(Some("http://127.0.0.1:1"), true));
        let result = storage.exists(&locator()).await;
        assert!(
            matches!(result, Err(StorageError::Unavailable(_))),
            "unexpected result: {result:?}"
        );
    }

    #[tokio::test]
    async fn test_exists_service_404_is_not_found() {
        let endpoint = fake_endpoint(Some(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ))
        .await;
        let result = head_against(&endpoint, None).await;
        assert!(
            matches!(
                result,
                Err(StorageError::NotFound(ref what)) if what == "my-bucket/path/to/file.txt"
            ),
            "unexpected result: {result:?}"
        );
    }

    #[tokio::test]
    async fn test_exists_service_403_is_not_found() {
        let endpoint = fake_endpoint(Some(
            "HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ))
        .await;
        let result = head_against(&endpoint, None).await;
        assert!(
            matches!(result, Err(StorageError::NotFound(_))),
            "unexpected result: {result:?}"
        );
    }

    #[tokio::test]
    async fn test_exists_success() {
        let endpoint = fake_endpoint(Some(
            "HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ))
        .await;
        let result = head_against(&endpoint, None).await;
        assert!(result.is_ok(), "unexpected result: {result:?}");
    }

    #[tokio::test]
    async fn test_exists_silent_endpoint_times_out() {
        let endpoint = fake_endpoint(None).await;
        let started = std::time::Instant::now();
        let result = head_against(&endpoint, Some(Duration::from_millis(300))).await;
        assert!(
            matches!(result, Err(StorageError::Timeout(_))),
            "unexpected result: {result:?}"
        );
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(
            result.map_err(|e| e.status()).err(),
            Some(hyper::StatusCode::GATEWAY_TIMEOUT)
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_region() {
        let provider = S3Provider::default();
        let result = provider.connect("").await;
        assert!(matches!(result, Err(StorageError::InvalidRegion(_))));
    }
}
