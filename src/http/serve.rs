//! Range-aware object serving
//!
//! [`serve_content`] turns a resolved object and the request's `Range` and
//! conditional headers into a complete response. Decisions are made up front
//! by [`plan`]; the body is then produced lazily from a [`RangedReader`],
//! one bounded window at a time, so only requested bytes are ever read.

use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::{Response, StatusCode};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;

use super::cache::{self, Conditions, Precondition, Validators};
use super::multipart;
use super::range::{parse_range_header, ByteRange, RangeRequestSpec};
use super::response::{self, empty_body, ServeBody};
use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::object::{ObjectHandle, RangedReader};

/// One piece of a response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Bytes generated by the server (multipart framing)
    Literal(Bytes),
    /// Bytes read from the object
    Window(ByteRange),
}

/// The parts of a request that affect how an object is served
#[derive(Debug, Clone, Default)]
pub struct ServeRequest {
    pub is_head: bool,
    pub range: Option<String>,
    pub conditions: Conditions,
}

#[derive(Debug, Clone, Copy)]
pub struct ServeOptions {
    /// Largest window requested from the reader per body frame
    pub chunk_size: u64,
}

/// Status, headers and body layout of a successful (200/206) response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePlan {
    pub status: StatusCode,
    pub content_type: String,
    /// `None` for multipart bodies
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub segments: Vec<Segment>,
}

/// Outcome of evaluating a request against an object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    NotModified,
    PreconditionFailed,
    Unsatisfiable,
    Content(ResponsePlan),
}

/// Decide how to answer `req` for `handle` without touching the object bytes
pub fn plan(req: &ServeRequest, handle: &ObjectHandle) -> Result<Plan> {
    let validators = validators(handle);
    match cache::evaluate(&req.conditions, &validators) {
        Precondition::NotModified => return Ok(Plan::NotModified),
        Precondition::Failed => return Ok(Plan::PreconditionFailed),
        Precondition::Proceed => {}
    }

    let range = req
        .range
        .as_deref()
        .filter(|_| cache::if_range_allows(req.conditions.if_range.as_deref(), &validators));

    let size = handle.size;
    let ranges = match parse_range_header(range, size)? {
        RangeRequestSpec::Absent => {
            let segments = ByteRange::new(0, size)
                .map(Segment::Window)
                .into_iter()
                .collect();
            return Ok(Plan::Content(ResponsePlan {
                status: StatusCode::OK,
                content_type: handle.content_type.clone(),
                content_length: Some(size),
                content_range: None,
                segments,
            }));
        }
        RangeRequestSpec::Unsatisfiable => return Ok(Plan::Unsatisfiable),
        RangeRequestSpec::Ranges(ranges) => ranges,
    };

    if let [single] = ranges.as_slice() {
        return Ok(Plan::Content(ResponsePlan {
            status: StatusCode::PARTIAL_CONTENT,
            content_type: handle.content_type.clone(),
            content_length: Some(single.len()),
            content_range: Some(single.content_range(size)),
            segments: vec![Segment::Window(*single)],
        }));
    }

    let boundary = multipart::generate_boundary();
    Ok(Plan::Content(ResponsePlan {
        status: StatusCode::PARTIAL_CONTENT,
        content_type: multipart::content_type(&boundary),
        content_length: None,
        content_range: None,
        segments: multipart::segments(&boundary, &handle.content_type, size, &ranges),
    }))
}

fn validators(handle: &ObjectHandle) -> Validators {
    Validators::new(handle.created, handle.etag.clone())
}

/// Build the full response for `req`, streaming the body from `reader`
pub fn serve_content(
    req: &ServeRequest,
    handle: &ObjectHandle,
    reader: RangedReader,
    options: &ServeOptions,
    logger: &Arc<Logger>,
) -> Response<ServeBody> {
    let plan = match plan(req, handle) {
        Ok(plan) => plan,
        Err(err) => {
            logger.debug(&format!(
                "Rejecting Range {:?} for {}/{}: {err}",
                req.range.as_deref().unwrap_or_default(),
                handle.bucket,
                handle.key
            ));
            Plan::Unsatisfiable
        }
    };

    let content = match plan {
        Plan::NotModified => return response::build_304_response(&validators(handle), logger),
        Plan::PreconditionFailed => return response::build_412_response(),
        Plan::Unsatisfiable => return response::build_416_response(handle.size, logger),
        Plan::Content(content) => content,
    };

    let validators = validators(handle);
    let mut builder = Response::builder()
        .status(content.status)
        .header("Content-Type", &content.content_type)
        .header("Accept-Ranges", "bytes")
        .header("Last-Modified", validators.last_modified_header());
    if let Some(etag) = &validators.etag {
        builder = builder.header("ETag", etag);
    }
    if let Some(length) = content.content_length {
        builder = builder.header("Content-Length", length);
    }
    if let Some(content_range) = &content.content_range {
        builder = builder.header("Content-Range", content_range);
    }

    // HEAD never opens a backend stream
    let body = if req.is_head {
        empty_body()
    } else {
        let state = BodyState {
            name: format!("{}/{}", handle.bucket, handle.key),
            reader,
            segments: content.segments.into(),
            chunk_size: options.chunk_size.max(1),
            logger: Arc::clone(logger),
        };
        StreamBody::new(body_stream(state).map_ok(Frame::data)).boxed_unsync()
    };

    response::finish(builder, body, logger)
}

/// Pending body segments and the reader that fills them
struct BodyState {
    name: String,
    reader: RangedReader,
    segments: VecDeque<Segment>,
    chunk_size: u64,
    logger: Arc<Logger>,
}

impl BodyState {
    async fn next_frame(&mut self) -> Result<Option<Bytes>> {
        let Some(segment) = self.segments.pop_front() else {
            return Ok(None);
        };
        let window = match segment {
            Segment::Literal(bytes) => return Ok(Some(bytes)),
            Segment::Window(window) => window,
        };

        let bytes = self
            .reader
            .read_at(window.start(), window.len().min(self.chunk_size))
            .await?;
        if bytes.is_empty() {
            return Err(Error::backend(
                format!("read {}", self.name),
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("object ended before byte {}", window.start()),
                ),
            ));
        }

        if let Some(rest) = ByteRange::new(window.start() + bytes.len() as u64, window.end()) {
            self.segments.push_front(Segment::Window(rest));
        }
        Ok(Some(bytes))
    }
}

fn body_stream(state: BodyState) -> impl futures::Stream<Item = io::Result<Bytes>> + Send {
    futures::stream::try_unfold(state, |mut state| async move {
        match state.next_frame().await {
            Ok(Some(bytes)) => Ok(Some((bytes, state))),
            Ok(None) => {
                state.reader.close();
                Ok(None)
            }
            Err(err) => {
                state
                    .logger
                    .error(&format!("Aborting body of {}: {err}", state.name));
                Err(io::Error::from(err))
            }
        }
    })
}
