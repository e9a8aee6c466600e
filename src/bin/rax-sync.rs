//! RAX Sync - folder mirroring client for the upload server

use log::{error, info};
use std::process::ExitCode;

use rax_upload_server::sync::{self, SyncConfig};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match SyncConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tokio::select! {
        result = sync::run(config) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Sync client stopped: {}", e);
                ExitCode::FAILURE
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            ExitCode::SUCCESS
        }
    }
}
