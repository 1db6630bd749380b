// self
use crate::{_prelude::*, obs::FlowKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span wrapping one flow operation.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Creates a new span tagged with the provided flow kind + stage.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("oauth2_calendar.flow", flow = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a failed flow by error kind only; messages and sources stay out of the log.
pub fn record_flow_failure(kind: FlowKind, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		if err.requires_login() || matches!(err, Error::StateMismatch) {
			tracing::info!(flow = kind.as_str(), error.kind = err.kind(), "Flow ended early.");
		} else {
			tracing::warn!(flow = kind.as_str(), error.kind = err.kind(), "Flow failed.");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, err);
	}
}

/// Installs the global `fmt` subscriber filtered by `RUST_LOG` (default `info`).
#[cfg(feature = "server")]
pub fn init_tracing() -> Result<(), Box<dyn StdError + Send + Sync>> {
	// crates.io
	use tracing_subscriber::{EnvFilter, fmt};

	let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

	fmt().with_env_filter(filter).with_target(false).try_init()
}
