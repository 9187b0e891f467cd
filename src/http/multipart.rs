//! `multipart/byteranges` framing
//!
//! A multi-range response body is a sequence of parts, each introduced by a
//! boundary line and its own `Content-Range` / `Content-Type` headers,
//! followed by a closing boundary:
//!
//! ```text
//! --BOUNDARY\r\n
//! Content-Range: bytes 0-9/100\r\n
//! Content-Type: text/plain\r\n
//! \r\n
//! <bytes 0..=9>\r\n
//! --BOUNDARY\r\n
//! ...
//! <last part bytes>\r\n
//! --BOUNDARY--\r\n
//! ```

use bytes::Bytes;
use uuid::Uuid;

use super::range::ByteRange;
use super::serve::Segment;

/// Fresh boundary token for one response
pub fn generate_boundary() -> String {
    Uuid::new_v4().simple().to_string()
}

/// `Content-Type` header value of the whole multipart response
pub fn content_type(boundary: &str) -> String {
    format!("multipart/byteranges; boundary={boundary}")
}

/// Lay out the body segments for `ranges`, in the order given
pub fn segments(boundary: &str, part_type: &str, size: u64, ranges: &[ByteRange]) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(ranges.len() * 2 + 1);
    for (i, range) in ranges.iter().enumerate() {
        let lead = if i == 0 { "" } else { "\r\n" };
        let header = format!(
            "{lead}--{boundary}\r\nContent-Range: {}\r\nContent-Type: {part_type}\r\n\r\n",
            range.content_range(size)
        );
        segments.push(Segment::Literal(Bytes::from(header)));
        segments.push(Segment::Window(*range));
    }
    segments.push(Segment::Literal(Bytes::from(format!(
        "\r\n--{boundary}--\r\n"
    ))));
    segments
}

/// Split a multipart body into `(headers, data)` pairs
#[cfg(test)]
pub fn split_parts(body: &[u8], boundary: &str) -> Vec<(String, Vec<u8>)> {
    fn find(haystack: &[u8], needle: &[u8]) -> usize {
        haystack
            .windows(needle.len())
            .position(|w| w == needle)
            .expect("delimiter present")
    }

    let opening = format!("--{boundary}");
    let separator = format!("\r\n--{boundary}");
    let mut rest = body
        .strip_prefix(opening.as_bytes())
        .expect("body starts with boundary");
    let mut parts = Vec::new();

    while !rest.starts_with(b"--") {
        rest = rest.strip_prefix(b"\r\n").expect("CRLF after boundary");
        let header_end = find(rest, b"\r\n\r\n");
        let headers = String::from_utf8(rest[..header_end].to_vec()).expect("ASCII headers");
        rest = &rest[header_end + 4..];
        let data_end = find(rest, separator.as_bytes());
        parts.push((headers, rest[..data_end].to_vec()));
        rest = &rest[data_end + separator.len()..];
    }
    assert_eq!(rest, b"--\r\n", "closing delimiter");
    parts
}
