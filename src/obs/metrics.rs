// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowOutcome},
};

const FLOW_TOTAL: &str = "oauth2_calendar_flow_total";
const FLOW_ERRORS_TOTAL: &str = "oauth2_calendar_flow_errors_total";

/// Counts one attempt, success, or failure of a login stage.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(FLOW_TOTAL, "flow" => kind.as_str(), "outcome" => outcome.as_str())
			.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (FLOW_TOTAL, kind, outcome);
	}
}

/// Counts a failed stage labeled by [`Error::kind`] only.
pub fn record_flow_error(kind: FlowKind, err: &Error) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(FLOW_ERRORS_TOTAL, "flow" => kind.as_str(), "error_kind" => err.kind())
			.increment(1);
	}
	#[cfg(not(feature = "metrics"))]
	{
		let _ = (FLOW_ERRORS_TOTAL, kind, err);
	}
}
