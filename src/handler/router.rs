//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: path filtering, dispatch to the
//! redirect handler, HEAD body stripping and access logging.

use crate::config::AppState;
use crate::handler::redirect;
use crate::http;
use crate::logger::{self, AccessLogEntry};
use futures::FutureExt;
use http_body_util::Full;
use hyper::body::{Body as _, Bytes};
use hyper::{Method, Request, Response};
use std::any::Any;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Request fields kept after the request itself is released
struct RequestContext {
    method: Method,
    path: String,
    query: Option<String>,
    http_version: String,
    referer: Option<String>,
    user_agent: Option<String>,
}

impl RequestContext {
    fn from_request<B>(req: &Request<B>) -> Self {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        Self {
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            query: req.uri().query().map(ToString::to_string),
            http_version: format!("{:?}", req.version())
                .trim_start_matches("HTTP/")
                .to_string(),
            referer: header("referer"),
            user_agent: header("user-agent"),
        }
    }
}

/// Main entry point for HTTP request handling
///
/// The body is never read, so any body type is accepted.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: Option<SocketAddr>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let ctx = RequestContext::from_request(&req);
    drop(req);

    let response = AssertUnwindSafe(dispatch(&ctx, &state))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            logger::log_error(&format!(
                "Request handler panicked: {}",
                panic_message(panic.as_ref())
            ));
            http::build_500_response()
        });

    let response = if ctx.method == Method::HEAD {
        http::strip_body(response)
    } else {
        response
    };

    if state.access_log_enabled() {
        log_access(&ctx, &response, peer_addr, started, &state);
    }

    Ok(response)
}

/// Every method on `/` reaches the redirect handler; other paths are 404
async fn dispatch(ctx: &RequestContext, state: &AppState) -> Response<Full<Bytes>> {
    if ctx.path != "/" {
        return http::build_404_response();
    }

    redirect::handle_redirect(&ctx.path, ctx.query.as_deref(), state).await
}

fn log_access(
    ctx: &RequestContext,
    response: &Response<Full<Bytes>>,
    peer_addr: Option<SocketAddr>,
    started: Instant,
    state: &AppState,
) {
    let mut entry = AccessLogEntry::new(
        peer_addr.map_or_else(|| "-".to_string(), |a| a.ip().to_string()),
        ctx.method.to_string(),
        ctx.path.clone(),
    );
    entry.query.clone_from(&ctx.query);
    entry.http_version.clone_from(&ctx.http_version);
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .body()
        .size_hint()
        .exact()
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(0);
    entry.referer.clone_from(&ctx.referer);
    entry.user_agent.clone_from(&ctx.user_agent);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, &state.config.logging.access_log_format);
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
