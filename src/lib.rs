pub mod config;
pub mod error;
pub mod middleware;
pub mod server;
pub mod storage;
pub mod sync;
pub mod transfer;

pub use server::Server;
pub use storage::StorageGateway;
