//! CORS allow-list for the single frontend origin.

// crates.io
use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Builds a layer that admits exactly `origin` with `methods` and a JSON `Content-Type`.
///
/// Preflight requests are answered by the layer itself and never reach the inner gates.
pub fn cors_layer(origin: HeaderValue, methods: Vec<Method>) -> CorsLayer {
	CorsLayer::new()
		.allow_origin(AllowOrigin::exact(origin))
		.allow_methods(methods)
		.allow_headers([CONTENT_TYPE])
}
