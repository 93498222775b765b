//! `asc-mcp` binary: serves the App Store Connect tools over stdio.
//!
//! Configuration comes from `APP_STORE_CONNECT_*` environment variables.
//! Logs go to stderr; stdout carries protocol lines only.

use asc_auth::{AuthError, CredentialManager, TokenPolicy};
use asc_mcp::clients::{AppStoreClient, ConfigError, ServiceConfig, TransportError};
use asc_mcp::{serve_stdio, tools, ApiContext, McpServer, McpServerError, RetryConfig};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("credential error: {0}")]
    Auth(#[from] AuthError),

    #[error("client error: {0}")]
    Client(#[from] TransportError),

    #[error("tool registry error: {0}")]
    Registry(#[from] McpServerError),

    #[error("stdio error: {0}")]
    Io(#[from] std::io::Error),
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<(), StartupError> {
    let config = ServiceConfig::from_env()?;

    let credentials = CredentialManager::with_policy(config.credentials(), TokenPolicy::default())?;
    info!(issuer_id = %credentials.issuer_id(), key_id = %config.key_id, "Loaded API key");

    let client = AppStoreClient::new(config.endpoint.clone(), config.timeout(), Arc::new(credentials))?;
    let ctx = ApiContext::new(Arc::new(client), RetryConfig::for_reads(config.max_retries));

    let server = McpServer::app_store_connect(tools::registry(&ctx)?);
    serve_stdio(&server).await?;

    info!("Client disconnected, shutting down");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
