//! Environment-driven relay configuration.
//!
//! [`RelayConfig::from_env`] reads the process environment once at startup; tests feed values
//! through [`RelayConfig::from_lookup`] instead. Every failure names the offending variable.

// std
use std::net::IpAddr;
// crates.io
use axum::http::{HeaderValue, Method};
// self
use crate::{
	_prelude::*,
	auth::ClientCredentials,
	error::EnvError,
	gate::{ClientIdentity, RateLimitRule},
};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3_000;
/// Default OAuth token endpoint.
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://apis.usps.com/oauth2/v3/token";
/// Default address validation endpoint.
pub const DEFAULT_ADDRESS_ENDPOINT: &str = "https://apis.usps.com/addresses/v3/address";
/// Default outbound timeout in seconds.
pub const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;
/// Default 429 message for the address endpoint.
pub const DEFAULT_ADDRESS_RATE_MESSAGE: &str =
	"Too many address validation requests, please try again later.";
/// Default 429 message for the form endpoint.
pub const DEFAULT_FORM_RATE_MESSAGE: &str = "Too many form submissions, please try again later.";

/// Fully validated relay settings.
#[derive(Clone, Debug)]
pub struct RelayConfig {
	/// Credentials for the client-credentials exchange.
	pub credentials: ClientCredentials,
	/// Listen port on `0.0.0.0`.
	pub port: u16,
	/// The single origin allowed by CORS.
	pub allowed_origin: HeaderValue,
	/// Prefix every gated request's `Referer` must start with.
	pub referer_prefix: String,
	/// Methods allowed by CORS.
	pub allowed_methods: Vec<Method>,
	/// OAuth token endpoint.
	pub token_endpoint: Url,
	/// Address validation endpoint.
	pub address_endpoint: Url,
	/// Form collection endpoint.
	pub form_endpoint: Url,
	/// Timeout applied to every outbound call.
	pub upstream_timeout: std::time::Duration,
	/// Limiter rule for `POST /validate-address`.
	pub address_rate: RateLimitRule,
	/// Limiter rule for `POST /send-form`.
	pub form_rate: RateLimitRule,
	/// How rate-limited clients are identified.
	pub client_identity: ClientIdentity,
}
impl RelayConfig {
	/// Reads the configuration from the process environment.
	pub fn from_env() -> Result<Self, EnvError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Reads the configuration through `lookup`; empty values count as absent.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, EnvError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let env = Lookup(lookup);
		let credentials = ClientCredentials::new(
			env.required_with_fallback("CLIENT_ID", "USPS_CLIENT_ID")?,
			env.required_with_fallback("CLIENT_SECRET", "USPS_CLIENT_SECRET")?,
		);
		let origin = env.required("ALLOWED_ORIGIN")?;
		let allowed_origin = HeaderValue::from_str(&origin)
			.map_err(|e| EnvError::Invalid { name: "ALLOWED_ORIGIN", reason: e.to_string() })?;
		let referer_prefix = env.get("ALLOWED_REFERER_PREFIX").unwrap_or(origin);
		let allowed_methods = match env.get("ALLOWED_METHODS") {
			Some(raw) => parse_methods(&raw)?,
			None => vec![Method::POST],
		};
		let token_endpoint = env.endpoint("TOKEN_ENDPOINT_URL", Some(DEFAULT_TOKEN_ENDPOINT))?;
		let address_endpoint = env.endpoint("ADDRESS_ENDPOINT_URL", Some(DEFAULT_ADDRESS_ENDPOINT))?;
		let form_endpoint = env.endpoint("FORM_ENDPOINT_URL", None)?;
		let upstream_timeout = std::time::Duration::from_secs(
			env.positive("UPSTREAM_TIMEOUT_SECS", DEFAULT_UPSTREAM_TIMEOUT_SECS)?,
		);
		let address_rate = env.rate_rule(
			["ADDRESS_RATE_WINDOW_SECS", "ADDRESS_RATE_MAX", "ADDRESS_RATE_MESSAGE"],
			(60, 10, DEFAULT_ADDRESS_RATE_MESSAGE),
		)?;
		let form_rate = env.rate_rule(
			["FORM_RATE_WINDOW_SECS", "FORM_RATE_MAX", "FORM_RATE_MESSAGE"],
			(900, 5, DEFAULT_FORM_RATE_MESSAGE),
		)?;
		let client_identity = match env.get("CLIENT_IDENTITY") {
			Some(raw) => raw
				.parse()
				.map_err(|reason| EnvError::Invalid { name: "CLIENT_IDENTITY", reason })?,
			None => ClientIdentity::Peer,
		};

		Ok(Self {
			credentials,
			port: env.positive("PORT", DEFAULT_PORT)?,
			allowed_origin,
			referer_prefix,
			allowed_methods,
			token_endpoint,
			address_endpoint,
			form_endpoint,
			upstream_timeout,
			address_rate,
			form_rate,
			client_identity,
		})
	}
}

struct Lookup<F>(F);
impl<F> Lookup<F>
where
	F: Fn(&str) -> Option<String>,
{
	fn get(&self, name: &str) -> Option<String> {
		(self.0)(name).map(|value| value.trim().to_owned()).filter(|value| !value.is_empty())
	}

	fn required(&self, name: &'static str) -> Result<String, EnvError> {
		self.get(name).ok_or(EnvError::Missing { name })
	}

	fn required_with_fallback(
		&self,
		name: &'static str,
		fallback: &'static str,
	) -> Result<String, EnvError> {
		self.get(name).or_else(|| self.get(fallback)).ok_or(EnvError::Missing { name })
	}

	fn positive<T>(&self, name: &'static str, default: T) -> Result<T, EnvError>
	where
		T: FromStr + PartialOrd + Default,
		T::Err: Display,
	{
		let Some(raw) = self.get(name) else {
			return Ok(default);
		};
		let value = raw
			.parse::<T>()
			.map_err(|e| EnvError::Invalid { name, reason: format!("`{raw}` is not a number: {e}") })?;

		if value <= T::default() {
			return Err(EnvError::Invalid { name, reason: "value must be positive".into() });
		}

		Ok(value)
	}

	fn endpoint(&self, name: &'static str, default: Option<&str>) -> Result<Url, EnvError> {
		let raw = match (self.get(name), default) {
			(Some(raw), _) => raw,
			(None, Some(default)) => default.to_owned(),
			(None, None) => return Err(EnvError::Missing { name }),
		};
		let url =
			Url::parse(&raw).map_err(|e| EnvError::Invalid { name, reason: e.to_string() })?;

		if url.scheme() == "https" || (url.scheme() == "http" && is_loopback(&url)) {
			Ok(url)
		} else {
			Err(EnvError::InsecureEndpoint { name, url: raw })
		}
	}

	fn rate_rule(
		&self,
		[window_name, max_name, message_name]: [&'static str; 3],
		(window_secs, max_requests, message): (i64, u32, &str),
	) -> Result<RateLimitRule, EnvError> {
		let window_secs = self.positive(window_name, window_secs)?;

		if window_secs > RateLimitRule::MAX_WINDOW.whole_seconds() {
			return Err(EnvError::Invalid {
				name: window_name,
				reason: format!(
					"window must not exceed {} seconds",
					RateLimitRule::MAX_WINDOW.whole_seconds()
				),
			});
		}

		let max_requests = self.positive(max_name, max_requests)?;
		let message = self.get(message_name).unwrap_or_else(|| message.to_owned());

		Ok(RateLimitRule::new(Duration::seconds(window_secs), max_requests, message))
	}
}

fn parse_methods(raw: &str) -> Result<Vec<Method>, EnvError> {
	let methods = raw
		.split(',')
		.map(str::trim)
		.filter(|method| !method.is_empty())
		.map(|method| {
			Method::from_bytes(method.to_ascii_uppercase().as_bytes()).map_err(|e| {
				EnvError::Invalid { name: "ALLOWED_METHODS", reason: format!("`{method}`: {e}") }
			})
		})
		.collect::<Result<Vec<_>, _>>()?;

	if methods.is_empty() {
		return Err(EnvError::Invalid {
			name: "ALLOWED_METHODS",
			reason: "at least one method is required".into(),
		});
	}

	Ok(methods)
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => IpAddr::V4(ip).is_loopback(),
		Some(url::Host::Ipv6(ip)) => IpAddr::V6(ip).is_loopback(),
		None => false,
	}
}
