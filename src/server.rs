//! Router assembly and process lifecycle.
//!
//! Request path, outermost first: `TraceLayer`, CORS, `Referer` check, per-route rate limiter,
//! handler. `/health` sits outside the `Referer` and rate-limit gates.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	Json, Router, middleware,
	routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
// self
use crate::{
	_prelude::*,
	cache::{ReqwestTokenCache, TokenSource},
	clock::{Clock, SystemClock},
	config::RelayConfig,
	gate::{self, FixedWindowLimiter, RefererPolicy},
	http,
	proxy::{self, ProxyState},
};

/// Runtime collaborators the router is built from.
#[derive(Clone)]
pub struct RelayDeps {
	/// Source of bearer tokens for the address endpoint.
	pub tokens: Arc<dyn TokenSource>,
	/// Client used for the proxied calls.
	pub upstream: ReqwestClient,
	/// Clock driving the rate-limit windows.
	pub clock: Arc<dyn Clock>,
}
impl RelayDeps {
	/// Builds the production token cache and upstream client from `config`.
	pub fn from_config(config: &RelayConfig) -> Result<Self> {
		let tokens = ReqwestTokenCache::new(
			&config.token_endpoint,
			&config.credentials,
			config.upstream_timeout,
		)?;

		Ok(Self {
			tokens: Arc::new(tokens),
			upstream: http::upstream_client(config.upstream_timeout)?,
			clock: Arc::new(SystemClock),
		})
	}
}
impl Debug for RelayDeps {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RelayDeps").finish_non_exhaustive()
	}
}

/// Assembles the relay router.
pub fn router(config: &RelayConfig, deps: RelayDeps) -> Router {
	let RelayDeps { tokens, upstream, clock } = deps;
	let state = ProxyState::new(
		upstream,
		config.address_endpoint.clone(),
		config.form_endpoint.clone(),
		tokens,
	);
	let limiter = |rule| {
		Arc::new(FixedWindowLimiter::new(rule, config.client_identity.clone(), clock.clone()))
	};
	let address_limiter = limiter(config.address_rate.clone());
	let form_limiter = limiter(config.form_rate.clone());
	let gated = Router::new()
		.route(
			"/validate-address",
			post(proxy::validate_address)
				.route_layer(middleware::from_fn_with_state(address_limiter, gate::enforce_rate_limit)),
		)
		.route(
			"/send-form",
			post(proxy::send_form)
				.route_layer(middleware::from_fn_with_state(form_limiter, gate::enforce_rate_limit)),
		)
		.route_layer(middleware::from_fn_with_state(
			RefererPolicy::new(&config.referer_prefix),
			gate::enforce_referer,
		))
		.with_state(state);

	Router::new()
		.route("/health", get(health))
		.merge(gated)
		.layer(gate::cors_layer(config.allowed_origin.clone(), config.allowed_methods.clone()))
		.layer(TraceLayer::new_for_http())
}

/// Binds `0.0.0.0:PORT` and serves until Ctrl-C or SIGTERM.
pub async fn serve(config: RelayConfig) -> Result<()> {
	let deps = RelayDeps::from_config(&config)?;
	let app = router(&config, deps);
	let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], config.port))).await?;

	tracing::info!(addr = %listener.local_addr()?, "Address relay listening.");

	axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	tracing::info!("Address relay stopped.");

	Ok(())
}

async fn health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "status": "ok" }))
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::warn!(error = %e, "Failed to install the Ctrl-C handler.");
			std::future::pending::<()>().await;
		}
	};
	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			},
			Err(e) => {
				tracing::warn!(error = %e, "Failed to install the SIGTERM handler.");
				std::future::pending::<()>().await;
			},
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}

	tracing::info!("Shutdown signal received.");
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// crates.io
	use axum::{
		body::Body,
		http::{Request, StatusCode, header},
	};
	use http_body_util::BodyExt;
	use tower::ServiceExt;
	// self
	use super::*;
	use crate::{_preludet::*, auth::TokenSecret, cache::TokenFuture};

	#[derive(Default)]
	struct CountingTokens(AtomicUsize);
	impl TokenSource for CountingTokens {
		fn access_token(&self) -> TokenFuture<'_> {
			self.0.fetch_add(1, Ordering::SeqCst);

			Box::pin(async { Ok(TokenSecret::new("unit-token")) })
		}
	}

	fn unit_router(tokens: Arc<CountingTokens>) -> Router {
		let config = test_config(
			"http://127.0.0.1:9/token",
			"http://127.0.0.1:9/address",
			"http://127.0.0.1:9/form",
			&[],
		);

		build_test_router(&config, tokens, &test_clock())
	}

	#[tokio::test]
	async fn health_skips_referer_and_rate_limit() {
		let response = unit_router(Default::default())
			.oneshot(Request::get("/health").body(Body::empty()).expect("Request should build."))
			.await
			.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::OK);

		let body = response.into_body().collect().await.expect("Body should collect.").to_bytes();

		assert_eq!(&body[..], br#"{"status":"ok"}"#);
	}

	#[tokio::test]
	async fn referer_rejection_never_reaches_the_handler() {
		let tokens = Arc::new(CountingTokens::default());
		let response = unit_router(tokens.clone())
			.oneshot(
				Request::post("/validate-address")
					.header(header::CONTENT_TYPE, "application/json")
					.header(header::REFERER, "https://evil.example.net/")
					.body(Body::from("{}"))
					.expect("Request should build."),
			)
			.await
			.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::FORBIDDEN);
		assert_eq!(tokens.0.load(Ordering::SeqCst), 0);

		let body = response.into_body().collect().await.expect("Body should collect.").to_bytes();

		assert_eq!(&body[..], br#"{"error":"Forbidden: invalid referer"}"#);
	}

	#[tokio::test]
	async fn malformed_body_is_a_bad_request() {
		let tokens = Arc::new(CountingTokens::default());
		let response = unit_router(tokens.clone())
			.oneshot(
				Request::post("/send-form")
					.header(header::CONTENT_TYPE, "application/json")
					.header(header::REFERER, "https://shop.example.com/contact")
					.body(Body::from("[1, 2"))
					.expect("Request should build."),
			)
			.await
			.expect("Router should respond.");

		assert_eq!(response.status(), StatusCode::BAD_REQUEST);
		assert_eq!(tokens.0.load(Ordering::SeqCst), 0);
	}
}
