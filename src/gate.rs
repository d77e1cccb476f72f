//! Access gate applied before the proxy handlers run.
//!
//! Layers execute outermost first and short-circuit on the first rejection:
//!
//! 1. [`cors`]: one allowed origin and method set; preflights are answered here.
//! 2. [`referer`]: the `Referer` header must start with the configured prefix (403 otherwise).
//! 3. [`rate_limit`]: fixed-window counter per client key and endpoint (429 otherwise).

pub mod cors;
pub mod identity;
pub mod rate_limit;
pub mod referer;

pub use cors::*;
pub use identity::*;
pub use rate_limit::*;
pub use referer::*;

// crates.io
use axum::{
	Json,
	http::{StatusCode, header::RETRY_AFTER},
	response::{IntoResponse, Response},
};
// self
use crate::{_prelude::*, obs::GateKind};

/// Body returned when the `Referer` check fails.
pub const REFERER_REJECTION_MESSAGE: &str = "Forbidden: invalid referer";

/// Terminal rejection produced by a gate; the handler is never invoked.
#[derive(Clone, Debug, PartialEq)]
pub enum GateRejection {
	/// `Referer` header missing or not matching the configured prefix.
	Referer,
	/// The client exhausted its budget for the current window.
	RateLimited {
		/// Configured JSON body.
		message: serde_json::Value,
		/// Time until the window resets.
		retry_after: Duration,
	},
}
impl GateRejection {
	/// Gate stage that produced the rejection.
	pub fn gate(&self) -> GateKind {
		match self {
			Self::Referer => GateKind::Referer,
			Self::RateLimited { .. } => GateKind::RateLimit,
		}
	}
}
impl IntoResponse for GateRejection {
	fn into_response(self) -> Response {
		match self {
			Self::Referer => (
				StatusCode::FORBIDDEN,
				Json(serde_json::json!({ "error": REFERER_REJECTION_MESSAGE })),
			)
				.into_response(),
			Self::RateLimited { message, retry_after } => {
				// Round up so clients never retry inside the closed window.
				let secs = (retry_after + Duration::seconds(1) - Duration::nanoseconds(1))
					.whole_seconds()
					.max(0);

				(StatusCode::TOO_MANY_REQUESTS, [(RETRY_AFTER, secs.to_string())], Json(message))
					.into_response()
			},
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn referer_rejection_is_forbidden() {
		let response = GateRejection::Referer.into_response();

		assert_eq!(response.status(), StatusCode::FORBIDDEN);
	}

	#[test]
	fn rate_limit_rejection_rounds_retry_after_up() {
		let response = GateRejection::RateLimited {
			message: serde_json::json!({ "error": "slow down" }),
			retry_after: Duration::milliseconds(1_200),
		}
		.into_response();

		assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
		assert_eq!(
			response.headers().get(RETRY_AFTER).and_then(|value| value.to_str().ok()),
			Some("2")
		);
	}
}
