//! Request handler module
//!
//! Routes requests to the page templates, static assets and the chat relay.

pub mod chat;
pub mod pages;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
