//! HTTP response building module
//!
//! Builders for every response the redirect server emits.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

/// Build a plain-text response whose body is the canonical status text
///
/// Mirrors the usual `http.Error` shape: reason phrase plus newline.
pub fn build_status_response(status: StatusCode) -> Response<Full<Bytes>> {
    let text = format!("{}\n", status.canonical_reason().unwrap_or("Unknown Status"));
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("X-Content-Type-Options", "nosniff")
        .body(Full::new(Bytes::from(text.clone())))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::from(text)))
        })
}

/// Build 400 Bad Request response
pub fn build_400_response() -> Response<Full<Bytes>> {
    build_status_response(StatusCode::BAD_REQUEST)
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_status_response(StatusCode::NOT_FOUND)
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<Full<Bytes>> {
    build_status_response(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Build 302 redirect response
///
/// A target that is not a valid header value yields a 500 instead.
pub fn build_redirect_response(target: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::FOUND)
        .header("Location", target)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(Full::new(Bytes::from(format!(
            "<a href=\"{}\">Found</a>.\n",
            escape_html(target)
        ))))
        .unwrap_or_else(|e| {
            log_build_error("302", &e);
            build_500_response()
        })
}

/// Drop the body of a response to a HEAD request, keeping its headers
pub fn strip_body(resp: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    let (parts, _) = resp.into_parts();
    Response::from_parts(parts, Full::new(Bytes::new()))
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_string(resp: Response<Full<Bytes>>) -> String {
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map(http_body_util::Collected::to_bytes)
            .unwrap_or_default();
        String::from_utf8_lossy(&bytes).to_string()
    }

    #[tokio::test]
    async fn test_status_response_body() {
        let resp = build_400_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(resp).await, "Bad Request\n");

        let resp = build_404_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(resp).await, "Not Found\n");
    }

    #[tokio::test]
    async fn test_gateway_statuses() {
        let resp = build_status_response(StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(resp.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_string(resp).await, "Gateway Timeout\n");
    }

    #[tokio::test]
    async fn test_redirect_response() {
        let target = "https://b.s3.amazonaws.com/k?X-Amz-Expires=3600&a=1";
        let resp = build_redirect_response(target);
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()["Location"], target);
        assert!(body_string(resp).await.contains("X-Amz-Expires=3600&amp;a=1"));
    }

    #[test]
    fn test_redirect_invalid_target() {
        let resp = build_redirect_response("https://example.com/\nbad");
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_strip_body_keeps_headers() {
        let resp = strip_body(build_redirect_response("https://example.com/x"));
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()["Location"], "https://example.com/x");
        assert_eq!(body_string(resp).await, "");
    }
}
