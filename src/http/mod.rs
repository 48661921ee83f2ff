//! HTTP protocol layer module
//!
//! Response builders shared by the router and the redirect handler.

pub mod response;

// Re-export commonly used types
pub use response::{
    build_400_response, build_404_response, build_500_response, build_redirect_response,
    build_status_response, strip_body,
};
