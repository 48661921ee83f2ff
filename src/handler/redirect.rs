//! Redirect handler
//!
//! Turns `/?region=<region>&object=<bucket>/<key>` into a 302 pointing at a
//! presigned GET URL, after checking the object exists.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::future::Future;
use std::time::Duration;
use url::form_urlencoded;

use crate::config::AppState;
use crate::http;
use crate::logger;
use crate::storage::{ObjectLocator, StorageError};

/// Required query parameters, first value wins
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectParams {
    pub region: String,
    pub object: String,
}

impl RedirectParams {
    /// Extract `region` and `object` from a raw query string.
    ///
    /// Presence is by key: `region=` yields an empty region, not an error.
    /// Returns the name of the first missing parameter otherwise.
    pub fn from_query(query: Option<&str>) -> Result<Self, &'static str> {
        let mut region = None;
        let mut object = None;

        for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match key.as_ref() {
                "region" if region.is_none() => region = Some(value.into_owned()),
                "object" if object.is_none() => object = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(Self {
            region: region.ok_or("region")?,
            object: object.ok_or("object")?,
        })
    }
}

/// Handle a request for the redirect endpoint
pub async fn handle_redirect(
    path: &str,
    query: Option<&str>,
    state: &AppState,
) -> Response<Full<Bytes>> {
    if path != "/" {
        return http::build_404_response();
    }

    let params = match RedirectParams::from_query(query) {
        Ok(params) => params,
        Err(missing) => {
            logger::log_debug(&format!("Missing query parameter: {missing}"));
            return http::build_400_response();
        }
    };

    let locator = ObjectLocator::parse(&params.object);
    if !locator.is_addressable() {
        log_not_found(&locator);
        return http::build_404_response();
    }

    match presign_existing(&params.region, &locator, state).await {
        Ok(url) => http::build_redirect_response(&url),
        Err(StorageError::NotFound(_)) => {
            log_not_found(&locator);
            http::build_404_response()
        }
        Err(err) => {
            logger::log_error(&format!(
                "Region: {} Object: {locator}: {err}",
                params.region
            ));
            http::build_status_response(err.status())
        }
    }
}

/// Resolve a client for `region`, check the object exists, then presign it
async fn presign_existing(
    region: &str,
    locator: &ObjectLocator,
    state: &AppState,
) -> Result<String, StorageError> {
    let limit = state.storage_timeout;

    let storage = bounded(
        limit,
        state.storage.connect(region),
        StorageError::Credentials,
    )
    .await?;

    bounded(limit, storage.exists(locator), StorageError::Timeout).await?;

    bounded(
        limit,
        storage.presign_get(locator, state.presign_expiry),
        StorageError::Presign,
    )
    .await
}

/// Run a storage call under `limit`; expiry is reported through `on_timeout`
async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, StorageError>>,
    on_timeout: fn(String) -> StorageError,
) -> Result<T, StorageError> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(on_timeout(format!("no answer within {limit:?}"))))
}

fn log_not_found(locator: &ObjectLocator) {
    logger::log_info(&format!(
        "Bucket: {} Key: {} not found",
        locator.bucket, locator.key
    ));
}
