use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;
use voice_agent_core::Settings;
use voice_agent_server::handlers::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::load_from_env()?;
    let bind_addr = settings.server.bind_addr.clone();

    tracing::info!(bind_addr = %bind_addr, "voice agent server starting");

    let app_state = AppState::new(settings);
    let app = voice_agent_server::create_app(app_state);

    let addr: SocketAddr = bind_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid SERVER_BIND_ADDR: {e}"))?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
