//! Request handler module
//!
//! Responsible for request dispatch: every `GET`/`HEAD` path is an object key
//! in the configured bucket.

pub mod router;

// Re-export main entry point
pub use router::handle_request;
