#![forbid(unsafe_code)]

use std::{env, net::SocketAddr, sync::Arc};

use safesound_adapter::{router, AdapterRuntime};
use safesound_os::supervisor::DEFAULT_SHUTDOWN_GRACE;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let bind = env::var("SAFESOUND_HTTP_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    let addr: SocketAddr = bind.parse()?;

    let runtime = Arc::new(AdapterRuntime::default_from_env()?);
    let app = router(Arc::clone(&runtime));

    tracing::info!(%addr, "safesound_adapter_http listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    let abandoned = runtime.pipeline().shutdown(DEFAULT_SHUTDOWN_GRACE).await;
    tracing::info!(abandoned = abandoned.len(), "safesound_adapter_http stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
