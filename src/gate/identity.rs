//! Client identity strategies used to key rate-limit windows.
//!
//! Which value identifies a client depends on the deployment (direct exposure, reverse proxy,
//! load balancer), so the strategy is always chosen explicitly through configuration.

// std
use std::net::SocketAddr;
// crates.io
use axum::{
	extract::{ConnectInfo, Request},
	http::{HeaderMap, HeaderName},
};
// self
use crate::_prelude::*;

/// Key used when a strategy cannot identify the client.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Custom extractor signature accepted by [`ClientIdentity::Custom`].
pub type ClientKeyFn = Arc<dyn Fn(&Request) -> Option<String> + Send + Sync>;

/// How the rate limiter derives a client key from a request.
#[derive(Clone, Default)]
pub enum ClientIdentity {
	/// Remote socket IP as reported by the listener.
	#[default]
	Peer,
	/// Left-most `X-Forwarded-For` entry, falling back to the peer IP.
	ForwardedFor,
	/// Value of an arbitrary header (e.g. `X-Real-IP` set by a trusted proxy).
	Header(HeaderName),
	/// Caller-supplied extractor.
	Custom(ClientKeyFn),
}
impl ClientIdentity {
	/// Derives the rate-limit key for `req`, or [`UNKNOWN_CLIENT`].
	pub fn key_for(&self, req: &Request) -> String {
		let key = match self {
			Self::Peer => peer_ip(req),
			Self::ForwardedFor => forwarded_for(req.headers()).or_else(|| peer_ip(req)),
			Self::Header(name) => header_value(req.headers(), name),
			Self::Custom(extract) => extract(req),
		};

		key.unwrap_or_else(|| UNKNOWN_CLIENT.to_owned())
	}
}
impl Debug for ClientIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Peer => f.write_str("ClientIdentity::Peer"),
			Self::ForwardedFor => f.write_str("ClientIdentity::ForwardedFor"),
			Self::Header(name) => f.debug_tuple("ClientIdentity::Header").field(name).finish(),
			Self::Custom(_) => f.write_str("ClientIdentity::Custom(..)"),
		}
	}
}
impl FromStr for ClientIdentity {
	type Err = String;

	/// Parses `peer`, `forwarded`, or `header:<name>`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let value = s.trim();

		match value.to_ascii_lowercase().as_str() {
			"peer" => return Ok(Self::Peer),
			"forwarded" | "x-forwarded-for" => return Ok(Self::ForwardedFor),
			_ => {},
		}

		let Some((kind, name)) = value.split_once(':') else {
			return Err(format!("unknown client identity strategy `{value}`"));
		};

		if !kind.trim().eq_ignore_ascii_case("header") {
			return Err(format!("unknown client identity strategy `{value}`"));
		}

		HeaderName::from_bytes(name.trim().as_bytes())
			.map(Self::Header)
			.map_err(|e| format!("invalid header name `{}`: {e}", name.trim()))
	}
}

fn peer_ip(req: &Request) -> Option<String> {
	req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
	headers
		.get("x-forwarded-for")?
		.to_str()
		.ok()?
		.split(',')
		.map(str::trim)
		.find(|entry| !entry.is_empty())
		.map(str::to_owned)
}

fn header_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
	headers
		.get(name)?
		.to_str()
		.ok()
		.map(str::trim)
		.filter(|value| !value.is_empty())
		.map(str::to_owned)
}
