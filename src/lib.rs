//! HTTP byte-range serving for objects in a storage bucket.
//!
//! Request paths map to object keys. `GET`/`HEAD` responses honour `Range`
//! (single and multipart), `If-Range` and the conditional request headers,
//! and read only the requested bytes from the backend.

pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod logger;
pub mod object;
pub mod server;
pub mod storage;
