//! Observability helpers for the login flow.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `oauth2_calendar.flow` with the `flow` and
//!   `stage` fields, plus one event per failed flow carrying only [`Error::kind`].
//! - Enable `metrics` to increment the `oauth2_calendar_flow_total` counter for every
//!   attempt/success/failure, labeled by `flow` + `outcome`, and the
//!   `oauth2_calendar_flow_errors_total` counter for every failure, labeled by `flow` +
//!   `error_kind`.
//!
//! [`FlowMetrics`] counts login milestones in-process regardless of features.
//!
//! [`Error::kind`]: crate::error::Error::kind

mod counters;
mod metrics;
mod tracing;

pub use counters::*;
pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Stages of the browser login observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// `/login`: building the authorization URL.
	Login,
	/// `/callback`: state validation, code exchange, token storage.
	Callback,
	/// Protected resource calls with the session token.
	Resource,
	/// Session teardown.
	Logout,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Login => "login",
			FlowKind::Callback => "callback",
			FlowKind::Resource => "resource",
			FlowKind::Logout => "logout",
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
	/// Entry to a flow operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
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
