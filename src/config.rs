//! Scheduler configuration.
//!
//! [`SchedulerConfig`] can be assembled in code through `with_*` builders or decoded from a
//! JSON document whose keys use camelCase (`checkedOutMax`, `getAuthorisation`, ...). Durations
//! are expressed in whole milliseconds in JSON.

// crates.io
use oauth2::http::{HeaderName, header::RETRY_AFTER};
use serde::Deserializer;
// self
use crate::{_prelude::*, auth::AuthStrategy, error::ConfigError};

/// Default interval between periodic dispatch triggers.
pub const DEFAULT_REPEATED_TRIGGER_DELAY: StdDuration = StdDuration::from_millis(10);
/// Default concurrency ceiling.
pub const DEFAULT_CHECKED_OUT_MAX: usize = 3;
/// Default settling freeze applied after a credential is fetched from a remote party.
pub const DEFAULT_POST_AUTH_FETCH_FREEZE: StdDuration = StdDuration::from_millis(2_000);
/// Default attempt ceiling per request.
pub const DEFAULT_MAX_ATTEMPTS_PER_REQUEST: u32 = 3;
/// Freeze applied when a rate-limited response carries no usable retry hint.
pub const DEFAULT_RETRY_AFTER_FALLBACK: StdDuration = StdDuration::from_secs(10);

/// Settings governing one scheduler instance.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerConfig {
	/// Base URI every request path is appended to.
	pub origin: Url,
	/// Managed authorization strategy; `None` disables managed auth.
	#[serde(default, rename = "getAuthorisation")]
	pub authorisation: Option<AuthStrategy>,
	/// Interval of the periodic dispatch trigger.
	#[serde(default = "repeated_trigger_delay", deserialize_with = "millis")]
	pub repeated_trigger_delay: StdDuration,
	/// Maximum number of concurrently in-flight dispatches.
	#[serde(default = "checked_out_max")]
	pub checked_out_max: usize,
	/// Freeze applied after a fresh credential fetch from a remote strategy.
	#[serde(default = "post_auth_fetch_freeze", deserialize_with = "millis")]
	pub post_auth_fetch_freeze: StdDuration,
	/// Attempt ceiling for requests without their own override.
	#[serde(default = "max_attempts_per_request")]
	pub max_attempts_per_request: u32,
	/// Whether the default transport verifies TLS certificates.
	#[serde(default = "enabled")]
	pub verify_transport_certificates: bool,
	/// Whether outgoing requests are logged.
	#[serde(default = "enabled")]
	pub log_requests: bool,
	/// Response header carrying the rate-limit retry hint.
	#[serde(default = "retry_after_header_name", deserialize_with = "header_name")]
	pub retry_after_header_name: HeaderName,
	/// Freeze applied when a rate-limited response carries no usable retry hint.
	#[serde(default = "retry_after_fallback", deserialize_with = "millis")]
	pub retry_after_fallback: StdDuration,
}
impl SchedulerConfig {
	/// Creates a configuration for `origin` with every other setting at its default.
	pub fn new(origin: Url) -> Self {
		Self {
			origin,
			authorisation: None,
			repeated_trigger_delay: DEFAULT_REPEATED_TRIGGER_DELAY,
			checked_out_max: DEFAULT_CHECKED_OUT_MAX,
			post_auth_fetch_freeze: DEFAULT_POST_AUTH_FETCH_FREEZE,
			max_attempts_per_request: DEFAULT_MAX_ATTEMPTS_PER_REQUEST,
			verify_transport_certificates: true,
			log_requests: true,
			retry_after_header_name: RETRY_AFTER,
			retry_after_fallback: DEFAULT_RETRY_AFTER_FALLBACK,
		}
	}

	/// Decodes and validates a JSON configuration document.
	pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
		let mut de = serde_json::Deserializer::from_str(json);
		let config: Self = serde_path_to_error::deserialize(&mut de)?;

		config.validate()?;

		Ok(config)
	}

	/// Sets the managed authorization strategy.
	pub fn with_authorisation(mut self, strategy: AuthStrategy) -> Self {
		self.authorisation = Some(strategy);

		self
	}

	/// Overrides the periodic trigger interval.
	pub fn with_repeated_trigger_delay(mut self, delay: StdDuration) -> Self {
		self.repeated_trigger_delay = delay;

		self
	}

	/// Overrides the concurrency ceiling.
	pub fn with_checked_out_max(mut self, max: usize) -> Self {
		self.checked_out_max = max;

		self
	}

	/// Overrides the post-fetch settling freeze.
	pub fn with_post_auth_fetch_freeze(mut self, freeze: StdDuration) -> Self {
		self.post_auth_fetch_freeze = freeze;

		self
	}

	/// Overrides the default attempt ceiling.
	pub fn with_max_attempts_per_request(mut self, max: u32) -> Self {
		self.max_attempts_per_request = max;

		self
	}

	/// Toggles TLS certificate verification for the default transport.
	pub fn with_verify_transport_certificates(mut self, verify: bool) -> Self {
		self.verify_transport_certificates = verify;

		self
	}

	/// Toggles request logging.
	pub fn with_log_requests(mut self, log: bool) -> Self {
		self.log_requests = log;

		self
	}

	/// Overrides the response header consulted for rate-limit retry hints.
	pub fn with_retry_after_header_name(mut self, name: HeaderName) -> Self {
		self.retry_after_header_name = name;

		self
	}

	/// Overrides the freeze applied when no retry hint is usable.
	pub fn with_retry_after_fallback(mut self, fallback: StdDuration) -> Self {
		self.retry_after_fallback = fallback;

		self
	}

	/// Checks that every setting can be operated with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !matches!(self.origin.scheme(), "http" | "https") || self.origin.cannot_be_a_base() {
			return Err(ConfigError::InvalidSetting {
				field: "origin",
				reason: "origin must be an absolute http or https URI",
			});
		}
		if self.repeated_trigger_delay.is_zero() {
			return Err(ConfigError::InvalidSetting {
				field: "repeatedTriggerDelay",
				reason: "trigger interval must be positive",
			});
		}
		if self.checked_out_max == 0 {
			return Err(ConfigError::InvalidSetting {
				field: "checkedOutMax",
				reason: "at least one request must be allowed in flight",
			});
		}
		if self.max_attempts_per_request == 0 {
			return Err(ConfigError::InvalidSetting {
				field: "maxAttemptsPerRequest",
				reason: "at least one attempt must be allowed",
			});
		}
		if let Some(strategy) = &self.authorisation {
			strategy.validate()?;
		}

		Ok(())
	}
}

fn repeated_trigger_delay() -> StdDuration {
	DEFAULT_REPEATED_TRIGGER_DELAY
}

fn checked_out_max() -> usize {
	DEFAULT_CHECKED_OUT_MAX
}

fn post_auth_fetch_freeze() -> StdDuration {
	DEFAULT_POST_AUTH_FETCH_FREEZE
}

fn max_attempts_per_request() -> u32 {
	DEFAULT_MAX_ATTEMPTS_PER_REQUEST
}

fn enabled() -> bool {
	true
}

fn retry_after_header_name() -> HeaderName {
	RETRY_AFTER
}

fn retry_after_fallback() -> StdDuration {
	DEFAULT_RETRY_AFTER_FALLBACK
}

fn millis<'de, D>(deserializer: D) -> Result<StdDuration, D::Error>
where
	D: Deserializer<'de>,
{
	u64::deserialize(deserializer).map(StdDuration::from_millis)
}

fn header_name<'de, D>(deserializer: D) -> Result<HeaderName, D::Error>
where
	D: Deserializer<'de>,
{
	let raw = String::deserialize(deserializer)?;

	HeaderName::from_bytes(raw.as_bytes()).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn minimal_document_uses_defaults() {
		let config = SchedulerConfig::from_json_str(r#"{"origin":"https://api.example.com"}"#)
			.expect("Minimal configuration should decode.");

		assert!(config.authorisation.is_none());
		assert_eq!(config.repeated_trigger_delay, StdDuration::from_millis(10));
		assert_eq!(config.checked_out_max, 3);
		assert_eq!(config.post_auth_fetch_freeze, StdDuration::from_millis(2_000));
		assert_eq!(config.max_attempts_per_request, 3);
		assert!(config.verify_transport_certificates);
		assert!(config.log_requests);
		assert_eq!(config.retry_after_header_name, RETRY_AFTER);
		assert_eq!(config.retry_after_fallback, StdDuration::from_secs(10));
	}

	#[test]
	fn camel_case_keys_and_descriptors_decode() {
		let config = SchedulerConfig::from_json_str(
			r#"{
				"origin": "https://api.example.com/v2",
				"getAuthorisation": {"auth_method": "basic", "client_id": "id", "client_secret": "pw"},
				"repeatedTriggerDelay": 25,
				"checkedOutMax": 8,
				"postAuthFetchFreeze": 0,
				"maxAttemptsPerRequest": 5,
				"verifyTransportCertificates": false,
				"logRequests": false,
				"retryAfterHeaderName": "X-RateLimit-Reset"
			}"#,
		)
		.expect("Full configuration should decode.");

		assert_eq!(config.authorisation.as_ref().map(AuthStrategy::as_str), Some("basic"));
		assert_eq!(config.repeated_trigger_delay, StdDuration::from_millis(25));
		assert_eq!(config.checked_out_max, 8);
		assert!(config.post_auth_fetch_freeze.is_zero());
		assert_eq!(config.max_attempts_per_request, 5);
		assert!(!config.verify_transport_certificates);
		assert_eq!(config.retry_after_header_name.as_str(), "x-ratelimit-reset");
	}

	#[test]
	fn decoding_errors_report_the_field_path() {
		let err = SchedulerConfig::from_json_str(
			r#"{"origin":"https://api.example.com","checkedOutMax":"many"}"#,
		)
		.expect_err("Wrongly typed settings should be rejected.");

		match err {
			ConfigError::Parse { path, .. } => assert_eq!(path, "checkedOutMax"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn validation_rejects_unusable_settings() {
		let origin = Url::parse("https://api.example.com").expect("Fixture URL should parse.");
		let err = SchedulerConfig::new(origin.clone())
			.with_checked_out_max(0)
			.validate()
			.expect_err("A zero ceiling should be rejected.");

		assert!(matches!(err, ConfigError::InvalidSetting { field: "checkedOutMax", .. }));

		let err = SchedulerConfig::new(origin)
			.with_repeated_trigger_delay(StdDuration::ZERO)
			.validate()
			.expect_err("A zero trigger interval should be rejected.");

		assert!(matches!(err, ConfigError::InvalidSetting { field: "repeatedTriggerDelay", .. }));

		let err = SchedulerConfig::new(Url::parse("ftp://files.example.com").expect("Fixture URL should parse."))
			.validate()
			.expect_err("Non-HTTP origins should be rejected.");

		assert!(matches!(err, ConfigError::InvalidSetting { field: "origin", .. }));
	}
}
