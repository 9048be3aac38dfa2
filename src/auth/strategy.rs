//! Credential acquisition strategies.
//!
//! [`AuthStrategy`] is a closed set of variants behind one capability: produce a
//! [`RawCredential`]. The `none` and `basic` variants are computed locally, `oauth2` performs
//! a client-credentials exchange through the scheduler's [`Transport`], and `custom` defers to
//! a caller-supplied [`CredentialFetcher`].

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
// self
use crate::{
	_prelude::*,
	auth::{RawCredential, TokenSecret},
	error::{AuthError, ConfigError},
	http::Transport,
	oauth,
};

/// Lifetime assigned to credentials that never need refreshing.
const NEVER_EXPIRES_SECS: i64 = 100 * 365 * 24 * 60 * 60;

/// Boxed future returned by [`CredentialFetcher::fetch`].
pub type CredentialFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RawCredential, AuthError>> + 'a + Send>>;

/// Caller-supplied refresh function producing fresh credential material.
///
/// Any `Fn() -> impl Future<Output = Result<RawCredential, AuthError>>` closure implements
/// the trait.
pub trait CredentialFetcher
where
	Self: Send + Sync,
{
	/// Fetches a new credential.
	fn fetch(&self) -> CredentialFuture<'_>;
}
impl<F, Fut> CredentialFetcher for F
where
	F: Send + Sync + Fn() -> Fut,
	Fut: 'static + Send + Future<Output = Result<RawCredential, AuthError>>,
{
	fn fetch(&self) -> CredentialFuture<'_> {
		Box::pin(self())
	}
}

/// OAuth 2.0 client-credentials exchange settings.
#[derive(Clone, Debug, Deserialize)]
pub struct ClientCredentials {
	/// Token endpoint.
	pub uri: Url,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// OAuth 2.0 client secret, sent with HTTP Basic client authentication.
	pub client_secret: TokenSecret,
	/// Optional scopes requested with every exchange.
	#[serde(default)]
	pub scopes: Vec<String>,
}
impl ClientCredentials {
	/// Creates settings for the provided token endpoint and client pair.
	pub fn new(uri: Url, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			uri,
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			scopes: Vec::new(),
		}
	}

	/// Adds a scope to every exchange.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.scopes.push(scope.into());

		self
	}
}

/// Strategy used by the [`CredentialManager`](crate::auth::CredentialManager) to mint
/// credentials.
///
/// Deserializes from `{"auth_method": "none" | "basic" | "oauth2", ...}` descriptors; the
/// `custom` variant can only be built in code.
#[derive(Clone, Deserialize)]
#[serde(tag = "auth_method", rename_all = "lowercase")]
pub enum AuthStrategy {
	/// No authorization header.
	None,
	/// Fixed HTTP Basic credential.
	Basic {
		/// Basic auth user name.
		client_id: String,
		/// Basic auth password.
		client_secret: TokenSecret,
	},
	/// OAuth 2.0 client-credentials exchange.
	OAuth2(ClientCredentials),
	/// Caller-supplied refresh function.
	#[serde(skip)]
	Custom(Arc<dyn CredentialFetcher>),
}
impl AuthStrategy {
	/// Builds a fixed HTTP Basic strategy.
	pub fn basic(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self::Basic { client_id: client_id.into(), client_secret: TokenSecret::new(client_secret) }
	}

	/// Wraps a caller-supplied refresh function.
	pub fn custom(fetcher: impl 'static + CredentialFetcher) -> Self {
		Self::Custom(Arc::new(fetcher))
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(&self) -> &'static str {
		match self {
			Self::None => "none",
			Self::Basic { .. } => "basic",
			Self::OAuth2(_) => "oauth2",
			Self::Custom(_) => "custom",
		}
	}

	/// Returns `true` when fetching contacts a remote party, which warrants a settling freeze.
	pub fn is_remote(&self) -> bool {
		matches!(self, Self::OAuth2(_) | Self::Custom(_))
	}

	pub(crate) fn validate(&self) -> Result<(), ConfigError> {
		match self {
			Self::Basic { client_id, .. } if client_id.is_empty() => Err(ConfigError::InvalidSetting {
				field: "getAuthorisation.client_id",
				reason: "basic credentials require a client identifier",
			}),
			Self::OAuth2(settings) if settings.client_id.is_empty() =>
				Err(ConfigError::InvalidSetting {
					field: "getAuthorisation.client_id",
					reason: "oauth2 credentials require a client identifier",
				}),
			Self::OAuth2(settings) if !matches!(settings.uri.scheme(), "http" | "https") =>
				Err(ConfigError::InvalidSetting {
					field: "getAuthorisation.uri",
					reason: "token endpoint must use http or https",
				}),
			_ => Ok(()),
		}
	}

	pub(crate) async fn fetch(
		&self,
		transport: &Arc<dyn Transport>,
	) -> Result<RawCredential, AuthError> {
		match self {
			Self::None => Ok(RawCredential::new("none", "").expires_in(NEVER_EXPIRES_SECS)),
			Self::Basic { client_id, client_secret } => {
				let encoded = STANDARD.encode(format!("{client_id}:{}", client_secret.expose()));

				Ok(RawCredential::new("basic", encoded).expires_in(NEVER_EXPIRES_SECS))
			},
			Self::OAuth2(settings) =>
				oauth::exchange_client_credentials(settings, Arc::clone(transport)).await,
			Self::Custom(fetcher) => fetcher.fetch().await,
		}
	}
}
impl Debug for AuthStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::None => f.write_str("AuthStrategy::None"),
			Self::Basic { client_id, .. } => f
				.debug_struct("AuthStrategy::Basic")
				.field("client_id", client_id)
				.field("client_secret", &"<redacted>")
				.finish(),
			Self::OAuth2(settings) => f.debug_tuple("AuthStrategy::OAuth2").field(settings).finish(),
			Self::Custom(_) => f.write_str("AuthStrategy::Custom(..)"),
		}
	}
}
