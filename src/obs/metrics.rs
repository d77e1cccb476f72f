// self
use crate::obs::{FlowKind, FlowOutcome, GateKind};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"address_relay_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records a request rejected by an access gate (when enabled).
pub fn record_gate_rejection(gate: GateKind) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("address_relay_gate_rejections_total", "gate" => gate.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = gate;
	}
}
