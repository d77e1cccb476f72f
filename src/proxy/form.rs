//! `POST /send-form`.

// crates.io
use axum::{
	Json,
	extract::{State, rejection::JsonRejection},
	response::Response,
};
use serde_json::{Map, Value};
// self
use crate::{
	error::UpstreamError,
	obs::FlowKind,
	proxy::{ProxyState, RelayRejection, relay_json},
};

/// Fixed body message for any form submission failure.
pub const FORM_FAILURE_MESSAGE: &str = "Error sending data to Google Script";

const ENDPOINT: &str = "form";

/// Flattens a JSON object into form fields, keeping key order.
///
/// Strings are sent as-is and everything else as compact JSON text, except `null`, which becomes an
/// empty field rather than the text `null` a browser `URLSearchParams` would produce.
pub fn encode_form(fields: &Map<String, Value>) -> Vec<(String, String)> {
	fields
		.iter()
		.map(|(name, value)| {
			let value = match value {
				Value::Null => String::new(),
				Value::String(text) => text.clone(),
				other => other.to_string(),
			};

			(name.clone(), value)
		})
		.collect()
}

/// Re-encodes the JSON body as a form and posts it to the form collector without a token.
pub async fn send_form(
	State(state): State<ProxyState>,
	payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Response, RelayRejection> {
	let Json(fields) = payload?;

	state
		.relay(FlowKind::SendForm, FORM_FAILURE_MESSAGE, async {
			let response = state
				.client
				.post(state.form_endpoint.clone())
				.form(&encode_form(&fields))
				.send()
				.await
				.map_err(|e| UpstreamError::from_reqwest(ENDPOINT, e))?;

			relay_json(ENDPOINT, response).await
		})
		.await
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn values_are_flattened_to_text() {
		let Value::Object(fields) = serde_json::json!({
			"name": "Ada",
			"age": 36,
			"subscribed": true,
			"phone": null,
			"tags": ["a", "b"],
			"meta": { "k": 1 }
		}) else {
			panic!("Fixture should be an object.");
		};
		let encoded = encode_form(&fields);

		assert!(encoded.contains(&("name".into(), "Ada".into())));
		assert!(encoded.contains(&("age".into(), "36".into())));
		assert!(encoded.contains(&("subscribed".into(), "true".into())));
		assert!(encoded.contains(&("phone".into(), String::new())));
		assert!(encoded.contains(&("tags".into(), r#"["a","b"]"#.into())));
		assert!(encoded.contains(&("meta".into(), r#"{"k":1}"#.into())));
		assert_eq!(encoded.len(), 6);
	}

	#[test]
	fn null_is_an_empty_field_not_the_text_null() {
		let Value::Object(fields) = serde_json::json!({ "phone": null, "note": "null" }) else {
			panic!("Fixture should be an object.");
		};

		assert_eq!(
			encode_form(&fields),
			vec![("note".to_owned(), "null".to_owned()), ("phone".to_owned(), String::new())]
		);
	}
}
