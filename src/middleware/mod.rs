//! Server middleware
//!
//! Provides request logging for the HTTP router.

pub mod logging;

pub use logging::log_request;
