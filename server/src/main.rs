use anyhow::Context;
use clap::Parser;
use sketchrelay_server::config::Config;
use sketchrelay_server::hub::Hub;
use sketchrelay_server::logging;
use sketchrelay_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    logging::init(config.log_format);

    let state = AppState::new(Hub::new(config.hub_config()), config.relay_mode);
    let app = sketchrelay_server::router(state, config.public_dir.clone());

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(
        %addr,
        relay_mode = ?config.relay_mode,
        outbox_capacity = config.outbox_capacity,
        echo_to_sender = config.echo_to_sender,
        "relay listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
