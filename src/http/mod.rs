//! HTTP protocol layer module
//!
//! Range parsing, conditional requests, multipart framing and response
//! building. Independent of where object bytes come from.

pub mod cache;
pub mod mime;
pub mod multipart;
pub mod range;
pub mod response;
pub mod serve;

// Re-export commonly used types
pub use range::{parse_range_header, ByteRange, RangeRequestSpec};
pub use response::{
    build_404_response, build_405_response, build_500_response, build_options_response, ServeBody,
};
pub use serve::{serve_content, ServeOptions, ServeRequest};
