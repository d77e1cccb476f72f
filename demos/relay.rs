//! Runs the relay on an ephemeral port in front of mocked token, address, and form upstreams, then
//! calls both endpoints the way the browser frontend would.

// std
use std::{collections::HashMap, net::SocketAddr};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
use tokio::net::TcpListener;
// self
use address_relay::{
	config::RelayConfig,
	reqwest::{Client, header},
	server::{self, RelayDeps},
};

const ORIGIN: &str = "https://shop.example.com";

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let upstream = MockServer::start_async().await;
	let token_mock = upstream
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let _address_mock = upstream
		.mock_async(|when, then| {
			when.method(GET).path("/address").header("authorization", "Bearer demo-access");
			then.status(200).header("content-type", "application/json").body(
				"{\"address\":{\"streetAddress\":\"123 MAIN ST\",\"city\":\"ANYTOWN\",\"state\":\"CA\",\"ZIPCode\":\"90001\"}}",
			);
		})
		.await;
	let _form_mock = upstream
		.mock_async(|when, then| {
			when.method(POST).path("/form");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"result\":\"success\"}");
		})
		.await;
	let vars = HashMap::from([
		("CLIENT_ID", "demo-client".to_owned()),
		("CLIENT_SECRET", "super-secret".to_owned()),
		("ALLOWED_ORIGIN", ORIGIN.to_owned()),
		("TOKEN_ENDPOINT_URL", upstream.url("/token")),
		("ADDRESS_ENDPOINT_URL", upstream.url("/address")),
		("FORM_ENDPOINT_URL", upstream.url("/form")),
	]);
	let config = RelayConfig::from_lookup(|name| vars.get(name).cloned())?;
	let app = server::router(&config, RelayDeps::from_config(&config)?);
	let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
	let relay_addr = listener.local_addr()?;

	tokio::spawn(async move {
		axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await
	});

	let client = Client::new();

	for (path, body) in [
		(
			"/validate-address",
			"{\"streetAddress\":\"123 Main St\",\"city\":\"Anytown\",\"state\":\"CA\",\"ZIPCode\":\"90001\"}",
		),
		("/send-form", "{\"name\":\"Ada\",\"message\":\"Hello!\"}"),
	] {
		let response = client
			.post(format!("http://{relay_addr}{path}"))
			.header(header::CONTENT_TYPE, "application/json")
			.header(header::REFERER, format!("{ORIGIN}/checkout"))
			.body(body)
			.send()
			.await?;

		println!("POST {path} -> {}: {}", response.status(), response.text().await?);
	}

	token_mock.assert_async().await;

	Ok(())
}
