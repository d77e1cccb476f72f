//! Upstream proxy handlers.
//!
//! Both handlers share one contract: a 2xx upstream answer whose body parses as JSON is relayed
//! byte-for-byte with status 200, and every other outcome (token failure, transport error,
//! timeout, non-2xx status, non-JSON body) collapses into the endpoint's fixed 500 body. The real
//! cause is only logged.

pub mod address;
pub mod form;

pub use address::*;
pub use form::*;

// crates.io
use axum::{
	Json,
	body::Bytes,
	extract::rejection::JsonRejection,
	http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
	response::{IntoResponse, Response},
};
use serde::de::IgnoredAny;
// self
use crate::{
	_prelude::*,
	cache::TokenSource,
	error::UpstreamError,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Characters of an upstream error body kept for logs.
pub const BODY_PREVIEW_CHARS: usize = 512;

/// Shared state handed to both proxy handlers.
#[derive(Clone)]
pub struct ProxyState {
	client: ReqwestClient,
	address_endpoint: Url,
	form_endpoint: Url,
	tokens: Arc<dyn TokenSource>,
}
impl ProxyState {
	/// Creates handler state from the upstream client, both endpoints, and a token source.
	pub fn new(
		client: ReqwestClient,
		address_endpoint: Url,
		form_endpoint: Url,
		tokens: Arc<dyn TokenSource>,
	) -> Self {
		Self { client, address_endpoint, form_endpoint, tokens }
	}

	/// Runs one proxied call, masking its failure behind `failure_message`.
	async fn relay<Fut>(
		&self,
		kind: FlowKind,
		failure_message: &'static str,
		call: Fut,
	) -> Result<Response, RelayRejection>
	where
		Fut: Future<Output = Result<Response>>,
	{
		let span = FlowSpan::new(kind, "relay");

		obs::record_flow_outcome(kind, FlowOutcome::Attempt);

		match span.instrument(call).await {
			Ok(response) => {
				obs::record_flow_outcome(kind, FlowOutcome::Success);

				Ok(response)
			},
			Err(e) => {
				obs::record_flow_outcome(kind, FlowOutcome::Failure);

				tracing::error!(
					flow = kind.as_str(),
					auth_failure = e.is_auth_failure(),
					error = %e,
					source = ?std::error::Error::source(&e),
					"Upstream relay failed."
				);

				Err(RelayRejection::Upstream { message: failure_message })
			},
		}
	}
}
impl Debug for ProxyState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProxyState")
			.field("address_endpoint", &self.address_endpoint.as_str())
			.field("form_endpoint", &self.form_endpoint.as_str())
			.finish()
	}
}

/// Caller-facing failure of a proxy handler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayRejection {
	/// The request body is not a JSON object; answered with 400.
	MalformedBody(String),
	/// Anything went wrong upstream; answered with 500 and the endpoint's fixed message.
	Upstream {
		/// Fixed message for the endpoint.
		message: &'static str,
	},
}
impl From<JsonRejection> for RelayRejection {
	fn from(rejection: JsonRejection) -> Self {
		Self::MalformedBody(rejection.body_text())
	}
}
impl IntoResponse for RelayRejection {
	fn into_response(self) -> Response {
		let (status, message) = match self {
			Self::MalformedBody(reason) => (StatusCode::BAD_REQUEST, reason),
			Self::Upstream { message } => (StatusCode::INTERNAL_SERVER_ERROR, message.to_owned()),
		};

		(status, Json(serde_json::json!({ "error": message }))).into_response()
	}
}

/// Turns an upstream response into the relayed one, or the matching [`UpstreamError`].
pub(crate) async fn relay_json(endpoint: &'static str, response: reqwest::Response) -> Result<Response> {
	let status = response.status();
	let body = response.bytes().await.map_err(|e| UpstreamError::from_reqwest(endpoint, e))?;

	if !status.is_success() {
		return Err(UpstreamError::Status {
			endpoint,
			status: status.as_u16(),
			body_preview: body_preview(&body),
		}
		.into());
	}

	serde_json::from_slice::<IgnoredAny>(&body)
		.map_err(|source| UpstreamError::MalformedBody { endpoint, source })?;

	Ok(json_response(body))
}

fn json_response(body: Bytes) -> Response {
	(StatusCode::OK, [(CONTENT_TYPE, HeaderValue::from_static("application/json"))], body)
		.into_response()
}

fn body_preview(body: &[u8]) -> String {
	let text = String::from_utf8_lossy(body);
	let mut preview = text.chars().take(BODY_PREVIEW_CHARS).collect::<String>();

	if text.chars().count() > BODY_PREVIEW_CHARS {
		preview.push_str("...");
	}

	preview
}
