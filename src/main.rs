//! `address-relay` binary: reads the environment, installs logging, and serves until signalled.

// crates.io
use color_eyre::Result;
// self
use address_relay::{config::RelayConfig, obs, server};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	obs::install_subscriber();

	let config = RelayConfig::from_env()?;

	tracing::info!(
		port = config.port,
		origin = ?config.allowed_origin,
		token_endpoint = %config.token_endpoint,
		address_endpoint = %config.address_endpoint,
		form_endpoint = %config.form_endpoint,
		"Starting address relay."
	);

	server::serve(config).await?;

	Ok(())
}
