//! Request handler module
//!
//! `router` filters and dispatches requests; `redirect` turns a valid request
//! into a presigned-URL redirect.

pub mod redirect;
pub mod router;

// Re-export main entry point
pub use router::handle_request;
