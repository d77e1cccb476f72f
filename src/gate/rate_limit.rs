//! Fixed-window rate limiting keyed by client identity.
//!
//! Each client key owns a window that opens on its first request and lasts for the configured
//! length. Requests past the cap inside an open window are rejected; the first request after the
//! window elapses opens a fresh one with its count reset to one.

// crates.io
use axum::{
	extract::{Request, State},
	middleware::Next,
	response::{IntoResponse, Response},
};
// self
use crate::{
	_prelude::*,
	clock::Clock,
	gate::{ClientIdentity, GateRejection},
	obs,
};

/// Window count above which elapsed windows are swept when a new one opens.
const SWEEP_THRESHOLD: usize = 1_024;

/// Window length, cap, and rejection body for one endpoint.
#[derive(Clone, Debug, PartialEq)]
pub struct RateLimitRule {
	/// Length of each fixed window.
	pub window: Duration,
	/// Requests allowed per window and client.
	pub max_requests: u32,
	/// JSON body returned with the 429 response.
	pub message: serde_json::Value,
}
impl RateLimitRule {
	/// Longest supported window; keeps window arithmetic inside the representable date range.
	pub const MAX_WINDOW: Duration = Duration::days(366);

	/// Creates a rule whose rejection body is `{"error": message}`.
	///
	/// Windows longer than [`Self::MAX_WINDOW`] are clamped to it.
	pub fn new(window: Duration, max_requests: u32, message: impl Into<String>) -> Self {
		Self {
			window: window.min(Self::MAX_WINDOW),
			max_requests,
			message: serde_json::json!({ "error": message.into() }),
		}
	}
}

/// Counter state for one client key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitWindow {
	/// Instant the current window opened.
	pub window_start: OffsetDateTime,
	/// Requests admitted in the current window.
	pub count: u32,
}
impl RateLimitWindow {
	fn is_open_at(&self, now: OffsetDateTime, length: Duration) -> bool {
		now < self.window_start + length
	}
}

/// Result of a limiter check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed immediately.
	Allow,
	/// The request must be rejected.
	Reject(RetryDirective),
}

/// Tells a rejected client when its window resets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryDirective {
	/// Instant when the window resets.
	pub earliest_retry_at: OffsetDateTime,
	/// Time left until that instant.
	pub recommended_backoff: Duration,
}
impl RetryDirective {
	/// Creates a new directive with the provided timing metadata.
	pub fn new(earliest_retry_at: OffsetDateTime, recommended_backoff: Duration) -> Self {
		Self { earliest_retry_at, recommended_backoff }
	}
}

/// In-memory fixed-window limiter for one endpoint.
pub struct FixedWindowLimiter {
	rule: RateLimitRule,
	identity: ClientIdentity,
	clock: Arc<dyn Clock>,
	windows: Mutex<HashMap<String, RateLimitWindow>>,
}
impl FixedWindowLimiter {
	/// Creates a limiter enforcing `rule` for clients identified by `identity`.
	pub fn new(rule: RateLimitRule, identity: ClientIdentity, clock: Arc<dyn Clock>) -> Self {
		Self { rule, identity, clock, windows: Default::default() }
	}

	/// Counts one request from `key` and decides whether it may proceed.
	pub fn check(&self, key: &str) -> RateLimitDecision {
		let now = self.clock.now_utc();
		let length = self.rule.window;
		let mut windows = self.windows.lock();

		if let Some(window) = windows.get_mut(key).filter(|window| window.is_open_at(now, length)) {
			if window.count >= self.rule.max_requests {
				let reset_at = window.window_start + length;

				return RateLimitDecision::Reject(RetryDirective::new(reset_at, reset_at - now));
			}

			window.count += 1;

			return RateLimitDecision::Allow;
		}

		if windows.len() >= SWEEP_THRESHOLD {
			windows.retain(|_, window| window.is_open_at(now, length));
		}
		if self.rule.max_requests == 0 {
			return RateLimitDecision::Reject(RetryDirective::new(now + length, length));
		}

		windows.insert(key.to_owned(), RateLimitWindow { window_start: now, count: 1 });

		RateLimitDecision::Allow
	}

	/// Snapshot of the window tracked for `key`, if any.
	pub fn window(&self, key: &str) -> Option<RateLimitWindow> {
		self.windows.lock().get(key).copied()
	}

	/// Number of client keys currently tracked.
	pub fn tracked_clients(&self) -> usize {
		self.windows.lock().len()
	}
}
impl Debug for FixedWindowLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("FixedWindowLimiter")
			.field("rule", &self.rule)
			.field("identity", &self.identity)
			.field("tracked_clients", &self.tracked_clients())
			.finish()
	}
}

/// Middleware enforcing a [`FixedWindowLimiter`]; rejected requests never reach the handler.
pub async fn enforce_rate_limit(
	State(limiter): State<Arc<FixedWindowLimiter>>,
	req: Request,
	next: Next,
) -> Response {
	let key = limiter.identity.key_for(&req);

	match limiter.check(&key) {
		RateLimitDecision::Allow => next.run(req).await,
		RateLimitDecision::Reject(directive) => {
			let rejection = GateRejection::RateLimited {
				message: limiter.rule.message.clone(),
				retry_after: directive.recommended_backoff,
			};

			obs::record_gate_rejection(rejection.gate());
			tracing::warn!(
				client = %key,
				path = %req.uri().path(),
				retry_at = %directive.earliest_retry_at,
				"Rate limit exceeded."
			);

			rejection.into_response()
		},
	}
}
