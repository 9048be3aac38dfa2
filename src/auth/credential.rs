//! Credential records, strategy output, and authorization header formatting.

// crates.io
use serde::Deserializer;
use time::format_description::well_known::Rfc3339;
// self
use crate::{_prelude::*, auth::TokenSecret, error::AuthError};

/// Discriminator selecting how a credential is rendered into an `Authorization` header.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenType {
	/// No header is attached.
	None,
	/// `Basic <token>`.
	Basic,
	/// `Bearer <token>`.
	Bearer,
	/// `<scheme> <token>` for any other scheme the strategy reports.
	Other(String),
}
impl TokenType {
	/// Parses a scheme label case-insensitively; an empty label means [`TokenType::None`].
	pub fn parse(label: &str) -> Self {
		let trimmed = label.trim();

		match trimmed.to_ascii_lowercase().as_str() {
			"" | "none" => Self::None,
			"basic" => Self::Basic,
			"bearer" => Self::Bearer,
			_ => Self::Other(trimmed.to_owned()),
		}
	}

	/// Returns the header scheme, or `None` when no header should be sent.
	pub fn scheme(&self) -> Option<&str> {
		match self {
			Self::None => None,
			Self::Basic => Some("Basic"),
			Self::Bearer => Some("Bearer"),
			Self::Other(scheme) => Some(scheme),
		}
	}
}
impl Display for TokenType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.scheme().unwrap_or("none"))
	}
}

/// Credential material produced by a refresh strategy before validation.
///
/// Strategies report either an absolute expiry or a relative lifetime in whole seconds;
/// the absolute instant wins when both are present. The relative lifetime is anchored to the
/// moment the strategy's response is turned into a [`Credential`].
#[derive(Clone, Deserialize)]
pub struct RawCredential {
	/// Scheme label such as `bearer` or `basic`.
	pub token_type: String,
	/// Opaque access token.
	pub access_token: TokenSecret,
	/// Relative lifetime in whole seconds.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Absolute expiry (RFC 3339 when decoded from JSON).
	#[serde(default, deserialize_with = "deserialize_rfc3339")]
	pub expires_at: Option<OffsetDateTime>,
}
impl RawCredential {
	/// Creates strategy output without an expiry; add one with [`Self::expires_in`] or
	/// [`Self::expires_at`].
	pub fn new(token_type: impl Into<String>, access_token: impl Into<String>) -> Self {
		Self {
			token_type: token_type.into(),
			access_token: TokenSecret::new(access_token),
			expires_in: None,
			expires_at: None,
		}
	}

	/// Sets a relative lifetime in whole seconds.
	pub fn expires_in(mut self, seconds: i64) -> Self {
		self.expires_in = Some(seconds);

		self
	}

	/// Sets an absolute expiry instant.
	pub fn expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Decodes strategy output from a JSON document, reporting the offending field path.
	pub fn from_json(bytes: &[u8]) -> Result<Self, AuthError> {
		let mut de = serde_json::Deserializer::from_slice(bytes);

		serde_path_to_error::deserialize(&mut de).map_err(malformed)
	}

	/// Decodes strategy output from an already-parsed JSON value.
	pub fn from_value(value: serde_json::Value) -> Result<Self, AuthError> {
		serde_path_to_error::deserialize(value).map_err(malformed)
	}
}
impl Debug for RawCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RawCredential")
			.field("token_type", &self.token_type)
			.field("access_token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Validated credential cached by the [`CredentialManager`](crate::auth::CredentialManager).
///
/// Consumers only ever see clones; the manager keeps the authoritative copy.
#[derive(Clone)]
pub struct Credential {
	/// Header scheme.
	pub token_type: TokenType,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Instant after which the credential must not be reused.
	pub expires_at: OffsetDateTime,
	/// Monotonic version assigned when the credential was fetched.
	pub version: u64,
}
impl Credential {
	/// Validates strategy output, anchoring relative expiries at `now`.
	pub fn from_raw(raw: RawCredential, now: OffsetDateTime, version: u64) -> Result<Self, AuthError> {
		let token_type = TokenType::parse(&raw.token_type);

		if token_type != TokenType::None && raw.access_token.is_empty() {
			return Err(AuthError::Malformed {
				reason: format!("access_token is empty for a {token_type} credential"),
			});
		}

		let expires_at = match (raw.expires_at, raw.expires_in) {
			(Some(instant), _) => instant,
			(None, Some(seconds)) => {
				if seconds <= 0 {
					return Err(AuthError::ExpiryOutOfRange { seconds });
				}

				now.checked_add(Duration::seconds(seconds))
					.ok_or(AuthError::ExpiryOutOfRange { seconds })?
			},
			(None, None) => return Err(AuthError::MissingExpiry),
		};

		Ok(Self { token_type, access_token: raw.access_token, expires_at, version })
	}

	/// Returns `true` when the credential may still be reused at `instant`.
	pub fn is_fresh_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at > instant
	}

	/// Renders the `Authorization` header value; empty for [`TokenType::None`].
	pub fn header_value(&self) -> String {
		match self.token_type.scheme() {
			Some(scheme) => format!("{scheme} {}", self.access_token.expose()),
			None => String::new(),
		}
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("token_type", &self.token_type)
			.field("access_token", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.field("version", &self.version)
			.finish()
	}
}

fn malformed(err: serde_path_to_error::Error<serde_json::Error>) -> AuthError {
	AuthError::Malformed { reason: format!("{} at `{}`", err.inner(), err.path()) }
}

fn deserialize_rfc3339<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
	D: Deserializer<'de>,
{
	let Some(raw) = Option::<String>::deserialize(deserializer)? else {
		return Ok(None);
	};

	OffsetDateTime::parse(&raw, &Rfc3339).map(Some).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn token_type_parses_known_schemes() {
		assert_eq!(TokenType::parse("bearer"), TokenType::Bearer);
		assert_eq!(TokenType::parse(" Basic "), TokenType::Basic);
		assert_eq!(TokenType::parse(""), TokenType::None);
		assert_eq!(TokenType::parse("DPoP"), TokenType::Other("DPoP".into()));
	}

	#[test]
	fn relative_expiry_is_anchored_at_response_time() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let credential =
			Credential::from_raw(RawCredential::new("bearer", "abc").expires_in(1800), now, 7)
				.expect("Relative expiries should convert.");

		assert_eq!(credential.expires_at, macros::datetime!(2025-01-01 00:30 UTC));
		assert_eq!(credential.version, 7);
		assert_eq!(credential.header_value(), "Bearer abc");
	}

	#[test]
	fn absolute_expiry_wins_over_relative() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let expires = macros::datetime!(2025-01-02 00:00 UTC);
		let raw = RawCredential::new("bearer", "abc").expires_in(60).expires_at(expires);
		let credential = Credential::from_raw(raw, now, 1).expect("Absolute expiries should convert.");

		assert_eq!(credential.expires_at, expires);
	}

	#[test]
	fn missing_or_invalid_expiry_is_rejected() {
		let now = OffsetDateTime::now_utc();
		let err = Credential::from_raw(RawCredential::new("bearer", "abc"), now, 1)
			.expect_err("Credentials without an expiry should be rejected.");

		assert!(matches!(err, AuthError::MissingExpiry));

		let err = Credential::from_raw(RawCredential::new("bearer", "abc").expires_in(0), now, 1)
			.expect_err("Zero lifetimes should be rejected.");

		assert!(matches!(err, AuthError::ExpiryOutOfRange { seconds: 0 }));
	}

	#[test]
	fn empty_token_is_only_valid_without_a_scheme() {
		let now = OffsetDateTime::now_utc();

		assert!(Credential::from_raw(RawCredential::new("none", "").expires_in(60), now, 1).is_ok());
		assert!(matches!(
			Credential::from_raw(RawCredential::new("bearer", "").expires_in(60), now, 1),
			Err(AuthError::Malformed { .. })
		));
	}

	#[test]
	fn freshness_requires_expiry_strictly_in_future() {
		let now = macros::datetime!(2025-01-01 00:00 UTC);
		let credential =
			Credential::from_raw(RawCredential::new("bearer", "abc").expires_at(now), now, 1)
				.expect("Credential fixture should build.");

		assert!(!credential.is_fresh_at(now));
		assert!(credential.is_fresh_at(now - Duration::seconds(1)));
	}

	#[test]
	fn json_decoding_reports_field_path() {
		let raw = RawCredential::from_json(
			br#"{"token_type":"bearer","access_token":"abc","expires_at":"2025-01-01T00:00:00Z"}"#,
		)
		.expect("Well-formed JSON should decode.");

		assert_eq!(raw.expires_at, Some(macros::datetime!(2025-01-01 00:00 UTC)));

		let err = RawCredential::from_json(
			br#"{"token_type":"bearer","access_token":"abc","expires_in":"soon"}"#,
		)
		.expect_err("Wrongly typed expiries should be rejected.");

		match err {
			AuthError::Malformed { reason } => assert!(reason.contains("expires_in"), "{reason}"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn debug_output_redacts_tokens() {
		let raw = RawCredential::new("bearer", "super-secret").expires_in(10);

		assert!(!format!("{raw:?}").contains("super-secret"));
	}
}
