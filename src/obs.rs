//! Observability helpers for relay flows and gate decisions.
//!
//! # Feature Flags
//!
//! - Spans named `address_relay.flow` carry the `flow` (operation) and `stage` (call site) fields.
//! - Enable `metrics` to increment `address_relay_flow_total` (labeled by `flow` + `outcome`) and
//!   `address_relay_gate_rejections_total` (labeled by `gate`).

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Client-credentials token exchange.
	TokenRefresh,
	/// Address validation proxy call.
	ValidateAddress,
	/// Form submission proxy call.
	SendForm,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::TokenRefresh => "token_refresh",
			FlowKind::ValidateAddress => "validate_address",
			FlowKind::SendForm => "send_form",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a relay operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure reported to the caller as a generic error.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Access gate stages that can reject a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GateKind {
	/// `Referer` prefix check.
	Referer,
	/// Fixed-window rate limiter.
	RateLimit,
}
impl GateKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			GateKind::Referer => "referer",
			GateKind::RateLimit => "rate_limit",
		}
	}
}
impl Display for GateKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
