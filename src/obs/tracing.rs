// self
use crate::{
	_prelude::*,
	error::{AttemptError, AuthError},
	obs::Stage,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedStage<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedStage<F> = F;

/// A span builder used by scheduler stages.
#[derive(Clone, Debug)]
pub struct StageSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl StageSpan {
	/// Creates a new span tagged with the provided stage + label.
	pub fn new(stage: Stage, label: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("origin_scheduler.stage", stage = stage.as_str(), label);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (stage, label);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedStage<Fut>
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

/// Logs an outgoing request line.
pub fn log_request(id: u64, method: &str, uri: &str, attempt: u32) {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(id, method, uri, attempt, "dispatching request");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (id, method, uri, attempt);
	}
}

/// Logs a failed dispatch attempt before the retry policy handles it.
pub fn log_attempt_failure(id: u64, attempts: u32, error: &AttemptError) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(id, attempts, status = error.status(), %error, "attempt failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (id, attempts, error);
	}
}

/// Logs a request that completed with an error.
pub fn log_terminal(id: u64, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(id, %error, "request failed");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (id, error);
	}
}

/// Logs the outcome of a credential refresh.
pub fn log_refresh(strategy: &str, version: Option<u64>, error: Option<&AuthError>) {
	#[cfg(feature = "tracing")]
	{
		match error {
			Some(error) => tracing::warn!(strategy, %error, "credential refresh failed"),
			None => tracing::debug!(strategy, version, "credential refreshed"),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (strategy, version, error);
	}
}

/// Logs a freeze extension.
pub fn log_freeze(delay: StdDuration) {
	#[cfg(feature = "tracing")]
	{
		let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);

		tracing::debug!(delay_ms, "dispatch frozen");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = delay;
	}
}
