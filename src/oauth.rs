//! OAuth 2.0 client-credentials exchange routed through the scheduler transport.

pub use oauth2;

// crates.io
use oauth2::{
	AsyncHttpClient, ClientId, ClientSecret, HttpClientError, HttpRequest, HttpResponse,
	RequestTokenError, Scope, TokenResponse, TokenUrl,
	basic::{BasicClient, BasicErrorResponse, BasicRequestTokenError},
};
// self
use crate::{
	_prelude::*,
	auth::{ClientCredentials, RawCredential},
	error::{AuthError, TransportError},
	http::Transport,
};

/// [`AsyncHttpClient`] adapter that sends token requests through a scheduler [`Transport`].
pub(crate) struct TransportHttpClient(Arc<dyn Transport>);
impl<'c> AsyncHttpClient<'c> for TransportHttpClient {
	type Error = HttpClientError<TransportError>;
	type Future = Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		Box::pin(async move {
			self.0.execute(request).await.map_err(|err| HttpClientError::Reqwest(Box::new(err)))
		})
	}
}

/// Performs the `client_credentials` grant and converts the token response.
pub(crate) async fn exchange_client_credentials(
	settings: &ClientCredentials,
	transport: Arc<dyn Transport>,
) -> Result<RawCredential, AuthError> {
	let client = BasicClient::new(ClientId::new(settings.client_id.clone()))
		.set_client_secret(ClientSecret::new(settings.client_secret.expose().to_owned()))
		.set_token_uri(TokenUrl::from_url(settings.uri.clone()));
	let http_client = TransportHttpClient(transport);
	let mut request = client.exchange_client_credentials();

	for scope in &settings.scopes {
		request = request.add_scope(Scope::new(scope.clone()));
	}

	let response = request.request_async(&http_client).await.map_err(map_request_error)?;
	let expires_in = response.expires_in().ok_or(AuthError::MissingExpiry)?.as_secs();
	let expires_in =
		i64::try_from(expires_in).map_err(|_| AuthError::ExpiryOutOfRange { seconds: i64::MAX })?;

	Ok(RawCredential::new(response.token_type().as_ref(), response.access_token().secret().as_str())
		.expires_in(expires_in))
}

fn map_request_error(err: BasicRequestTokenError<HttpClientError<TransportError>>) -> AuthError {
	match err {
		RequestTokenError::ServerResponse(response) => map_server_response_error(response),
		RequestTokenError::Request(error) => AuthError::transport(error),
		RequestTokenError::Parse(error, _body) => AuthError::Malformed {
			reason: format!("token response {} at `{}`", error.inner(), error.path()),
		},
		RequestTokenError::Other(message) => AuthError::Rejected { reason: message },
	}
}

fn map_server_response_error(response: BasicErrorResponse) -> AuthError {
	let reason = match response.error_description() {
		Some(description) => format!("{}: {description}", response.error().as_ref()),
		None => response.error().as_ref().to_owned(),
	};

	AuthError::Rejected { reason }
}
