//! The single bearer token held by the relay and its expiry arithmetic.

// self
use crate::{_prelude::*, auth::token::secret::TokenSecret, error::ConfigError};

/// Bearer token obtained from the last successful client-credentials exchange.
#[derive(Clone)]
pub struct CachedToken {
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Instant the exchange started.
	pub issued_at: OffsetDateTime,
	/// Instant after which the token is no longer served, safety margin already applied.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Margin subtracted from the provider lifetime so a token never expires mid-flight.
	pub const SAFETY_MARGIN: Duration = Duration::seconds(10);

	/// Builds a token from a provider lifetime measured from `issued_at`.
	///
	/// `expires_at = issued_at + expires_in - SAFETY_MARGIN`. Lifetimes whose expiry falls outside
	/// the representable date range are rejected.
	pub fn from_lifetime(
		access_token: TokenSecret,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Result<Self, ConfigError> {
		let expires_at = issued_at
			.checked_add(expires_in)
			.and_then(|instant| instant.checked_sub(Self::SAFETY_MARGIN))
			.ok_or(ConfigError::ExpiresInOutOfRange)?;

		Ok(Self { access_token, issued_at, expires_at })
	}

	/// Returns `true` if the token can still be served at `instant`.
	pub fn is_fresh_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("access_token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn expiry_subtracts_the_safety_margin() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token =
			CachedToken::from_lifetime(TokenSecret::new("access"), issued, Duration::seconds(3600))
				.expect("One hour lifetime should be representable.");

		assert_eq!(token.expires_at, macros::datetime!(2025-01-01 00:59:50 UTC));
	}

	#[test]
	fn freshness_flips_exactly_at_expiry() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token =
			CachedToken::from_lifetime(TokenSecret::new("access"), issued, Duration::seconds(60))
				.expect("One minute lifetime should be representable.");
		let expiry = macros::datetime!(2025-01-01 00:00:50 UTC);

		assert!(token.is_fresh_at(expiry - Duration::milliseconds(1)));
		assert!(!token.is_fresh_at(expiry));
	}

	#[test]
	fn unrepresentable_expiry_is_rejected() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let result = CachedToken::from_lifetime(
			TokenSecret::new("access"),
			issued,
			Duration::seconds(1_000_000_000_000),
		);

		assert!(matches!(result, Err(ConfigError::ExpiresInOutOfRange)));
	}

	#[test]
	fn short_lifetimes_are_born_expired() {
		let issued = macros::datetime!(2025-01-01 00:00 UTC);
		let token =
			CachedToken::from_lifetime(TokenSecret::new("access"), issued, Duration::seconds(5))
				.expect("Five second lifetime should be representable.");

		assert!(!token.is_fresh_at(issued));
	}

	#[test]
	fn debug_redacts_the_secret() {
		let token = CachedToken::from_lifetime(
			TokenSecret::new("top-secret"),
			OffsetDateTime::UNIX_EPOCH,
			Duration::seconds(60),
		)
		.expect("One minute lifetime should be representable.");

		assert!(!format!("{token:?}").contains("top-secret"));
	}
}
