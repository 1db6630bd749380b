//! Serves the Google login and calendar dashboard.

// std
use std::sync::Arc;
// crates.io
use color_eyre::eyre::{self, Result};
use tokio::net::TcpListener;
// self
use oauth2_calendar::{config::AppConfig, flows::LoginFlow, obs, store::MemoryStore, web};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	obs::init_tracing().map_err(|e| eyre::eyre!("failed to install the log subscriber: {e}"))?;

	let config = AppConfig::from_env()?;
	let flow = LoginFlow::from_config(&config, Arc::new(MemoryStore::default()))?;
	let app = web::router(flow, &config.server)?;
	let listener = TcpListener::bind(config.server.bind).await?;

	tracing::info!(
		addr = %config.server.bind,
		redirect_url = %config.credentials.redirect_url,
		"Listening."
	);

	axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

	tracing::info!("Shut down.");

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for the shutdown signal.");
	}
}
