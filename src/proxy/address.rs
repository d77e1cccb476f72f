//! `POST /validate-address`.

// crates.io
use axum::{
	Json,
	extract::{State, rejection::JsonRejection},
	http::header::{ACCEPT, AUTHORIZATION},
	response::Response,
};
use serde::{Deserializer, de::Error as _};
// self
use crate::{
	_prelude::*,
	error::UpstreamError,
	obs::FlowKind,
	proxy::{ProxyState, RelayRejection, relay_json},
};

/// Fixed body message for any address validation failure.
pub const ADDRESS_FAILURE_MESSAGE: &str = "Error validating address";

const ENDPOINT: &str = "address";

/// Address fields accepted from the frontend and forwarded as query parameters.
///
/// Every field is optional. Strings, numbers, and booleans are forwarded as text; `null` counts as
/// absent and unknown fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct AddressQuery {
	/// Street line.
	#[serde(rename = "streetAddress", default, deserialize_with = "scalar")]
	pub street_address: Option<String>,
	/// City name.
	#[serde(default, deserialize_with = "scalar")]
	pub city: Option<String>,
	/// State abbreviation.
	#[serde(default, deserialize_with = "scalar")]
	pub state: Option<String>,
	/// Five-digit ZIP code.
	#[serde(rename = "ZIPCode", default, deserialize_with = "scalar")]
	pub zip_code: Option<String>,
	/// Apartment, suite, or unit.
	#[serde(rename = "secondaryAddress", default, deserialize_with = "scalar")]
	pub secondary_address: Option<String>,
}
impl AddressQuery {
	/// Query parameters for the present fields, in upstream naming.
	pub fn pairs(&self) -> Vec<(&'static str, &str)> {
		[
			("streetAddress", &self.street_address),
			("city", &self.city),
			("state", &self.state),
			("ZIPCode", &self.zip_code),
			("secondaryAddress", &self.secondary_address),
		]
		.into_iter()
		.filter_map(|(name, value)| value.as_deref().map(|value| (name, value)))
		.collect()
	}
}

fn scalar<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: Deserializer<'de>,
{
	match serde_json::Value::deserialize(deserializer)? {
		serde_json::Value::Null => Ok(None),
		serde_json::Value::String(value) => Ok(Some(value)),
		serde_json::Value::Number(value) => Ok(Some(value.to_string())),
		serde_json::Value::Bool(value) => Ok(Some(value.to_string())),
		_ => Err(D::Error::custom("address fields must be strings, numbers, or booleans")),
	}
}

/// Validates an address through the upstream API using the cached bearer token.
pub async fn validate_address(
	State(state): State<ProxyState>,
	payload: Result<Json<AddressQuery>, JsonRejection>,
) -> Result<Response, RelayRejection> {
	let Json(query) = payload?;

	state
		.relay(FlowKind::ValidateAddress, ADDRESS_FAILURE_MESSAGE, async {
			let token = state.tokens.access_token().await?;
			let response = state
				.client
				.get(state.address_endpoint.clone())
				.query(&query.pairs())
				.header(AUTHORIZATION, token.bearer())
				.header(ACCEPT, "application/json")
				.send()
				.await
				.map_err(|e| UpstreamError::from_reqwest(ENDPOINT, e))?;

			relay_json(ENDPOINT, response).await
		})
		.await
}
