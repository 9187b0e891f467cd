//! HTTP response building module
//!
//! Provides the response body type and builders for the fixed-status
//! responses (304, 404, 405, 412, 416, 500, OPTIONS).

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::http::response::Builder;
use hyper::{Response, StatusCode};
use std::io;

use super::cache::Validators;
use crate::logger::Logger;

/// Body of every response: either fully buffered or streamed from storage
pub type ServeBody = UnsyncBoxBody<Bytes, io::Error>;

pub fn full_body(data: impl Into<Bytes>) -> ServeBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn empty_body() -> ServeBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Finish a builder, falling back to a bare 500 if a header was invalid
pub fn finish(builder: Builder, body: ServeBody, logger: &Logger) -> Response<ServeBody> {
    builder.body(body).unwrap_or_else(|e| {
        logger.error(&format!("Failed to build response: {e}"));
        let mut response = Response::new(empty_body());
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

/// Build a plain-text response whose headers are all static
fn text_response(status: StatusCode, text: &'static str) -> Response<ServeBody> {
    let mut response = Response::new(full_body(text));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Build 304 Not Modified response
pub fn build_304_response(validators: &Validators, logger: &Logger) -> Response<ServeBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header("Last-Modified", validators.last_modified_header());
    if let Some(etag) = &validators.etag {
        builder = builder.header("ETag", etag);
    }
    finish(builder, empty_body(), logger)
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ServeBody> {
    text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ServeBody> {
    let mut response = text_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed");
    response.headers_mut().insert(
        hyper::header::ALLOW,
        hyper::header::HeaderValue::from_static("GET, HEAD, OPTIONS"),
    );
    response
}

/// Build 412 Precondition Failed response
pub fn build_412_response() -> Response<ServeBody> {
    text_response(StatusCode::PRECONDITION_FAILED, "412 Precondition Failed")
}

/// Build 416 Range Not Satisfiable response
pub fn build_416_response(size: u64, logger: &Logger) -> Response<ServeBody> {
    let builder = Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Content-Range", format!("bytes */{size}"))
        .header("Accept-Ranges", "bytes");
    finish(builder, full_body("416 Range Not Satisfiable"), logger)
}

/// Build 500 response carrying the error text
pub fn build_500_response(message: &str) -> Response<ServeBody> {
    let mut response = Response::new(full_body(format!("{message}\n")));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool, logger: &Logger) -> Response<ServeBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Allow", "GET, HEAD, OPTIONS");

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET, HEAD, OPTIONS")
            .header(
                "Access-Control-Allow-Headers",
                "Range, If-Range, If-Match, If-None-Match, If-Modified-Since, If-Unmodified-Since",
            )
            .header("Access-Control-Max-Age", "86400");
    }

    finish(builder, empty_body(), logger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::Level;
    use chrono::TimeZone;

    async fn body_of(response: Response<ServeBody>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_416_carries_size() {
        let (logger, _) = Logger::capture(Level::Debug);
        let response = build_416_response(1234, &logger);
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()["content-range"], "bytes */1234");
        assert_eq!(body_of(response).await, "416 Range Not Satisfiable");
    }

    #[tokio::test]
    async fn test_304_has_validators_and_no_body() {
        let (logger, _) = Logger::capture(Level::Debug);
        let validators = Validators::new(
            chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap(),
            Some("\"v1\"".to_string()),
        );
        let response = build_304_response(&validators, &logger);
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(response.headers()["etag"], "\"v1\"");
        assert_eq!(
            response.headers()["last-modified"],
            "Fri, 01 Mar 2024 12:30:45 GMT"
        );
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_500_carries_message() {
        let response = build_500_response("stat b/k: access denied");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await, "stat b/k: access denied\n");
    }

    #[test]
    fn test_options_cors() {
        let (logger, _) = Logger::capture(Level::Debug);
        let response = build_options_response(true, &logger);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let response = build_options_response(false, &logger);
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[test]
    fn test_invalid_header_falls_back_to_500() {
        let (logger, buffer) = Logger::capture(Level::Debug);
        let builder = Response::builder().header("Content-Type", "bad\nvalue");
        let response = finish(builder, empty_body(), &logger);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(buffer.contains("[ERROR] Failed to build response"));
    }
}
