//! `Referer` prefix check.

// crates.io
use axum::{
	extract::{Request, State},
	http::{HeaderMap, header::REFERER},
	middleware::Next,
	response::{IntoResponse, Response},
};
// self
use crate::{_prelude::*, gate::GateRejection, obs};

/// Accepts requests whose `Referer` header textually starts with `prefix`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefererPolicy {
	prefix: Arc<str>,
}
impl RefererPolicy {
	/// Creates a policy for the given prefix.
	pub fn new(prefix: impl AsRef<str>) -> Self {
		Self { prefix: Arc::from(prefix.as_ref()) }
	}

	/// Checks the request headers; a missing or non-UTF-8 header fails.
	pub fn check(&self, headers: &HeaderMap) -> Result<(), GateRejection> {
		headers
			.get(REFERER)
			.and_then(|value| value.to_str().ok())
			.filter(|referer| referer.starts_with(&*self.prefix))
			.map(|_| ())
			.ok_or(GateRejection::Referer)
	}
}

/// Middleware enforcing a [`RefererPolicy`].
pub async fn enforce_referer(
	State(policy): State<RefererPolicy>,
	req: Request,
	next: Next,
) -> Response {
	match policy.check(req.headers()) {
		Ok(()) => next.run(req).await,
		Err(rejection) => {
			obs::record_gate_rejection(rejection.gate());
			tracing::warn!(
				path = %req.uri().path(),
				referer = ?req.headers().get(REFERER),
				"Rejected request with an unexpected referer."
			);

			rejection.into_response()
		},
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use axum::http::HeaderValue;
	// self
	use super::*;

	fn headers(referer: Option<&'static str>) -> HeaderMap {
		let mut headers = HeaderMap::new();

		if let Some(value) = referer {
			headers.insert(REFERER, HeaderValue::from_static(value));
		}

		headers
	}

	#[test]
	fn prefix_match_is_textual() {
		let policy = RefererPolicy::new("https://shop.example.com");

		assert_eq!(policy.check(&headers(Some("https://shop.example.com/checkout"))), Ok(()));
		assert_eq!(policy.check(&headers(Some("https://shop.example.com"))), Ok(()));
		// Textual prefix, so look-alike hosts sharing the prefix pass too.
		assert_eq!(policy.check(&headers(Some("https://shop.example.com.evil.test/"))), Ok(()));
		assert_eq!(
			policy.check(&headers(Some("https://evil.test/?https://shop.example.com"))),
			Err(GateRejection::Referer)
		);
	}

	#[test]
	fn missing_referer_fails() {
		let policy = RefererPolicy::new("https://shop.example.com");

		assert_eq!(policy.check(&headers(None)), Err(GateRejection::Referer));
	}
}
