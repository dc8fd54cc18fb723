use chat_relay::{RelayConfig, RelayState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid relay configuration");
            std::process::exit(2);
        }
    };
    if config.tokens.is_empty() {
        tracing::warn!("RELAY_TOKENS is empty; every connection will be rejected");
    }

    let port = config.port;
    let state = RelayState::new(config.tokens);
    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %port, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(%port, "chat relay listening");
    if let Err(e) = chat_relay::serve(listener, state).await {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}
