//! Server core functionality
//!
//! This module contains the HTTP server, its routes, and the startup path
//! that wires configuration into the storage gateway.

pub mod core;
pub mod routes;

pub use self::core::Server;
pub use self::routes::router;
