//! Transport seam for outbound calls to the origin.
//!
//! The scheduler's only dependency on an HTTP stack is [`Transport`]: given a fully formed
//! [`HttpRequest`], return the origin's [`HttpResponse`] whatever its status, or a
//! [`TransportError`] when no structured response exists. Status classification, retries,
//! and backoff all happen above this layer. The same transport also carries OAuth 2.0 token
//! exchanges so a single client configuration governs every call the scheduler makes.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use oauth2::http::{HeaderMap, HeaderName};
use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, error::TransportError};

pub use oauth2::{HttpRequest, HttpResponse};

/// Boxed future returned by [`Transport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<HttpResponse, TransportError>> + 'a + Send>>;

/// Executes a single HTTP call against the origin.
///
/// Implementations must return non-success responses as `Ok` so the scheduler can read their
/// status and headers; `Err` is reserved for failures that produced no response at all.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves with the origin's response.
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_>;
}
impl<T> Transport for Arc<T>
where
	T: ?Sized + Transport,
{
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		(**self).execute(request)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a client, optionally accepting invalid TLS certificates.
	pub fn new(verify_certificates: bool) -> Result<Self, crate::error::ConfigError> {
		let client =
			ReqwestClient::builder().danger_accept_invalid_certs(!verify_certificates).build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		Box::pin(async move {
			let request = reqwest::Request::try_from(request)?;
			let response = self.0.execute(request).await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new = HttpResponse::new(response.bytes().await?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok::<_, TransportError>(response_new)
		})
	}
}

/// Reads a retry hint from `name`, accepting delta-seconds or an RFC 2822 HTTP date.
pub fn parse_retry_after(headers: &HeaderMap, name: &HeaderName) -> Option<StdDuration> {
	let value = headers.get(name)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(StdDuration::from_secs(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return StdDuration::try_from(delta).ok();
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// crates.io
	use oauth2::http::{HeaderValue, header::RETRY_AFTER};
	// self
	use super::*;

	#[test]
	fn retry_after_reads_delta_seconds() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static(" 5 "));

		assert_eq!(parse_retry_after(&headers, &RETRY_AFTER), Some(StdDuration::from_secs(5)));
	}

	#[test]
	fn retry_after_reads_future_http_dates() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Fri, 01 Jan 2100 00:00:00 +0000"));

		let parsed = parse_retry_after(&headers, &RETRY_AFTER).expect("Dates should parse.");

		assert!(parsed > StdDuration::from_secs(365 * 24 * 60 * 60));

		headers.insert(RETRY_AFTER, HeaderValue::from_static("Thu, 01 Jan 1970 00:00:00 +0000"));

		assert_eq!(parse_retry_after(&headers, &RETRY_AFTER), None);
	}

	#[test]
	fn retry_after_honours_custom_header_names() {
		let mut headers = HeaderMap::new();
		let name = HeaderName::from_static("x-ratelimit-reset");

		headers.insert(name.clone(), HeaderValue::from_static("12"));
		headers.insert(RETRY_AFTER, HeaderValue::from_static("garbage"));

		assert_eq!(parse_retry_after(&headers, &name), Some(StdDuration::from_secs(12)));
		assert_eq!(parse_retry_after(&headers, &RETRY_AFTER), None);
	}
}
