//! Credential-injecting HTTP relay: a cached client-credentials token, two upstream proxy
//! endpoints, and a CORS/`Referer`/rate-limit gate in front of them.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod proxy;
pub mod server;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::{_prelude::*, clock::ManualClock};

	// crates.io
	use axum::Router;
	use time::macros::datetime;
	// self
	use crate::{
		auth::ClientCredentials,
		cache::{ReqwestTokenCache, TokenSource},
		config::RelayConfig,
		http::{self, ReqwestHttpClient},
		oauth::ReqwestTransportErrorMapper,
		server::{self, RelayDeps},
	};

	/// Client id used by test fixtures.
	pub const TEST_CLIENT_ID: &str = "relay-client";
	/// Client secret used by test fixtures.
	pub const TEST_CLIENT_SECRET: &str = "relay-secret";
	/// Origin allowed by [`test_config`].
	pub const TEST_ORIGIN: &str = "https://shop.example.com";

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Manual clock starting at a fixed, readable instant.
	pub fn test_clock() -> ManualClock {
		ManualClock::new(datetime!(2025-01-01 00:00 UTC))
	}

	/// Token cache against `token_url` driven by `clock`.
	pub fn build_test_token_cache(token_url: &str, clock: &ManualClock) -> ReqwestTokenCache {
		let endpoint = Url::parse(token_url).expect("Mock token endpoint should parse.");

		ReqwestTokenCache::with_http_client(
			&endpoint,
			&ClientCredentials::new(TEST_CLIENT_ID, TEST_CLIENT_SECRET),
			test_reqwest_http_client(),
			ReqwestTransportErrorMapper,
		)
		.expect("Test token cache should build.")
		.with_clock(Arc::new(clock.clone()))
	}

	/// Relay configuration pointing at mock upstreams, with `overrides` applied on top.
	pub fn test_config(
		token_url: &str,
		address_url: &str,
		form_url: &str,
		overrides: &[(&str, &str)],
	) -> RelayConfig {
		let mut vars = HashMap::from([
			("CLIENT_ID".to_owned(), TEST_CLIENT_ID.to_owned()),
			("CLIENT_SECRET".to_owned(), TEST_CLIENT_SECRET.to_owned()),
			("ALLOWED_ORIGIN".to_owned(), TEST_ORIGIN.to_owned()),
			("TOKEN_ENDPOINT_URL".to_owned(), token_url.to_owned()),
			("ADDRESS_ENDPOINT_URL".to_owned(), address_url.to_owned()),
			("FORM_ENDPOINT_URL".to_owned(), form_url.to_owned()),
		]);

		vars.extend(overrides.iter().map(|(name, value)| (name.to_string(), value.to_string())));

		RelayConfig::from_lookup(|name| vars.get(name).cloned())
			.expect("Test relay configuration should load.")
	}

	/// Router wired to `tokens`, a redirect-following upstream client, and `clock`.
	pub fn build_test_router(
		config: &RelayConfig,
		tokens: Arc<dyn TokenSource>,
		clock: &ManualClock,
	) -> Router {
		let deps = RelayDeps {
			tokens,
			upstream: http::upstream_client(config.upstream_timeout)
				.expect("Upstream test client should build."),
			clock: Arc::new(clock.clone()),
		};

		server::router(config, deps)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::Deserialize;
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
use color_eyre as _;
#[cfg(test)] use httpmock as _;
