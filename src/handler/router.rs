//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, path to key
//! mapping, object lookup, and hand-off to the range-serving engine.

use hyper::body::Body;
use hyper::header::{HeaderName, HeaderValue};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{AppState, HttpConfig};
use crate::error::{Error, ErrorKind};
use crate::http::cache::Conditions;
use crate::http::{self, ServeBody, ServeOptions, ServeRequest};
use crate::logger::AccessLogEntry;
use crate::object::{self, RangedReader};

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub version: Version,
    pub serve: ServeRequest,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
}

impl<'a> RequestContext<'a> {
    pub fn from_parts(parts: &'a Parts) -> Self {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };

        Self {
            method: &parts.method,
            path: parts.uri.path(),
            query: parts.uri.query(),
            version: parts.version,
            serve: ServeRequest {
                is_head: parts.method == Method::HEAD,
                range: header("range"),
                conditions: Conditions {
                    if_match: header("if-match"),
                    if_none_match: header("if-none-match"),
                    if_modified_since: header("if-modified-since"),
                    if_unmodified_since: header("if-unmodified-since"),
                    if_range: header("if-range"),
                },
            },
            referer: header("referer"),
            user_agent: header("user-agent"),
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    peer: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<ServeBody>, Infallible> {
    let started = Instant::now();
    // GET and HEAD carry no body worth reading
    let (parts, _) = req.into_parts();
    let ctx = RequestContext::from_parts(&parts);

    let (mut response, key) = route_request(&ctx, &state).await;
    decorate(&mut response, &state.config.http);

    let mut entry = AccessLogEntry::new(
        peer.ip().to_string(),
        ctx.method.to_string(),
        ctx.path.to_string(),
    );
    entry.query = ctx.query.map(ToString::to_string);
    entry.http_version = version_label(ctx.version).to_string();
    entry.object_key = key;
    entry.range = ctx.serve.range.clone();
    entry.status = response.status().as_u16();
    entry.body_bytes = body_size(&response);
    entry.referer = ctx.referer.clone();
    entry.user_agent = ctx.user_agent.clone();
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    state.logger.access(&entry);

    Ok(response)
}

/// Bytes the body will carry: exact for in-memory bodies, declared for streamed ones
fn body_size(response: &Response<ServeBody>) -> Option<u64> {
    response.body().size_hint().exact().or_else(|| {
        response
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    })
}

/// Check HTTP method and return appropriate response for anything but GET/HEAD
fn check_http_method(method: &Method, state: &AppState) -> Option<Response<ServeBody>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response(
            state.config.http.enable_cors,
            &state.logger,
        )),
        _ => {
            state.logger.warn(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Serve the object named by the request path; also returns the key, if any
async fn route_request(
    ctx: &RequestContext<'_>,
    state: &Arc<AppState>,
) -> (Response<ServeBody>, Option<String>) {
    if let Some(resp) = check_http_method(ctx.method, state) {
        return (resp, None);
    }

    let Some(key) = object::object_key(ctx.path, &state.config.http.index_key) else {
        state
            .logger
            .warn(&format!("Rejecting request path: {}", ctx.path));
        return (http::build_404_response(), None);
    };

    let bucket = &state.config.storage.bucket;
    let timeout = state.config.performance.backend_timeout();
    let handle = match object::resolve(state.store.as_ref(), bucket, &key, timeout, &state.logger).await {
        Ok(handle) => handle,
        Err(err) => return (error_response(&err), Some(key)),
    };

    let reader = RangedReader::new(
        Arc::clone(&state.store),
        &handle,
        timeout,
        Arc::clone(&state.logger),
    );
    let options = ServeOptions {
        chunk_size: state.config.http.write_chunk_size,
    };
    let response = http::serve_content(&ctx.serve, &handle, reader, &options, &state.logger);
    (response, Some(key))
}

fn error_response(err: &Error) -> Response<ServeBody> {
    match err.kind() {
        ErrorKind::NotFound => http::build_404_response(),
        ErrorKind::ClientError | ErrorKind::Backend => http::build_500_response(&err.to_string()),
    }
}

/// Headers added to every response
fn decorate(response: &mut Response<ServeBody>, config: &HttpConfig) {
    let headers = response.headers_mut();
    if let Ok(server) = HeaderValue::from_str(&config.server_name) {
        headers.insert(hyper::header::SERVER, server);
    }
    if config.enable_cors {
        headers
            .entry(hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .or_insert(HeaderValue::from_static("*"));
        headers.insert(
            HeaderName::from_static("access-control-expose-headers"),
            HeaderValue::from_static("Content-Range, Content-Length, Accept-Ranges, ETag"),
        );
    }
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
