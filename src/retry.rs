//! Failure classification and attempt accounting.

// crates.io
use oauth2::http::{HeaderName, StatusCode};
// self
use crate::{
	_prelude::*,
	auth::CredentialManager,
	backoff::BackoffController,
	config::SchedulerConfig,
	error::{AttemptError, FailedResponse},
	http::{self, HttpResponse},
	queue::QueueItem,
};

/// Where the `Authorization` header of an attempt came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HeaderSource {
	/// Managed credential with the given version.
	Managed(u64),
	/// The request's own refresh callback.
	Callback,
	/// A fixed value or no header at all.
	Fixed,
}

/// What to do with an item after a failed attempt.
#[derive(Debug)]
pub(crate) enum Verdict {
	/// Reinsert at the queue head.
	Requeue(QueueItem),
	/// Ceiling reached; complete the item with the error.
	Fail(QueueItem, Error),
}

/// Classifies origin responses and decides whether a failed request is dispatched again.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
	/// Attempt ceiling for requests without their own override.
	pub max_attempts: u32,
	/// Response header carrying the rate-limit retry hint.
	pub retry_after_header_name: HeaderName,
	/// Freeze applied when a rate-limited response has no usable hint.
	pub retry_after_fallback: StdDuration,
}
impl RetryPolicy {
	/// Extracts the policy settings from a scheduler configuration.
	pub fn from_config(config: &SchedulerConfig) -> Self {
		Self {
			max_attempts: config.max_attempts_per_request,
			retry_after_header_name: config.retry_after_header_name.clone(),
			retry_after_fallback: config.retry_after_fallback,
		}
	}

	/// Passes 2xx responses through and turns every other status into an [`AttemptError`].
	pub fn classify(&self, response: HttpResponse) -> Result<HttpResponse, AttemptError> {
		let status = response.status();

		if status.is_success() {
			return Ok(response);
		}

		let (parts, body) = response.into_parts();
		let failed = FailedResponse { status: status.as_u16(), headers: parts.headers, body };

		Err(match status {
			StatusCode::UNAUTHORIZED => AttemptError::Unauthorized { response: failed },
			StatusCode::TOO_MANY_REQUESTS => AttemptError::RateLimited {
				retry_after: http::parse_retry_after(&failed.headers, &self.retry_after_header_name),
				response: failed,
			},
			_ => AttemptError::Status { response: failed },
		})
	}

	/// Freeze to apply for a rate-limit signal.
	pub fn freeze_duration(&self, retry_after: Option<StdDuration>) -> StdDuration {
		retry_after.unwrap_or(self.retry_after_fallback)
	}

	/// Attempt ceiling for a request with the given override.
	pub fn ceiling(&self, max_attempts: Option<u32>) -> u32 {
		max_attempts.unwrap_or(self.max_attempts)
	}

	/// Applies the side effects of a failed attempt and counts it against the item.
	pub(crate) fn on_failure(
		&self,
		mut item: QueueItem,
		error: AttemptError,
		source: HeaderSource,
		credentials: Option<&CredentialManager>,
		backoff: &BackoffController,
	) -> Verdict {
		match &error {
			AttemptError::Unauthorized { .. } => match source {
				HeaderSource::Managed(version) =>
					if let Some(credentials) = credentials {
						credentials.invalidate(version);
					},
				HeaderSource::Callback => item.force_auth_refresh = true,
				HeaderSource::Fixed => {},
			},
			AttemptError::RateLimited { retry_after, .. } =>
				backoff.freeze_for(self.freeze_duration(*retry_after)),
			_ => {},
		}

		item.attempts += 1;

		if item.attempts >= self.ceiling(item.options.max_attempts) {
			let attempts = item.attempts;

			Verdict::Fail(item, Error::Exhausted { attempts, last: error })
		} else {
			Verdict::Requeue(item)
		}
	}
}
