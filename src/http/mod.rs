//! HTTP protocol layer module
//!
//! Response builders, ETag handling and MIME detection shared by the page,
//! asset and chat handlers.

pub mod cache;
pub mod mime;
pub mod response;

// Re-export commonly used types
pub use response::{
    build_304_response, build_404_response, build_405_response, build_413_response,
    build_500_response, build_health_response, build_html_response, build_json_response,
    build_options_response,
};
