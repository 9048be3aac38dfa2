//! Request descriptions submitted by callers and the responses delivered back to them.

pub use oauth2::http::Method;

// crates.io
use oauth2::http::{
	HeaderMap, HeaderValue, Request,
	header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	error::{AttemptError, AuthError, ConfigError},
	http::{HttpRequest, HttpResponse},
};

const APPLICATION_JSON: &str = "application/json";

/// Boxed future returned by [`HeaderRefresher::refresh`].
pub type HeaderFuture<'a> = Pin<Box<dyn Future<Output = Result<String, AuthError>> + 'a + Send>>;

/// Per-request authorization callback.
///
/// Receives `true` when the previous attempt was rejected with 401 and a fresh value must be
/// minted. Any `Fn(bool) -> impl Future<Output = Result<String, AuthError>>` closure
/// implements the trait.
pub trait HeaderRefresher
where
	Self: Send + Sync,
{
	/// Produces the `Authorization` header value for the next attempt.
	fn refresh(&self, force: bool) -> HeaderFuture<'_>;
}
impl<F, Fut> HeaderRefresher for F
where
	F: Send + Sync + Fn(bool) -> Fut,
	Fut: 'static + Send + Future<Output = Result<String, AuthError>>,
{
	fn refresh(&self, force: bool) -> HeaderFuture<'_> {
		Box::pin(self(force))
	}
}

/// Authorization override attached to a single request.
#[derive(Clone)]
pub enum RequestAuth {
	/// Fixed header value.
	Static(String),
	/// Callback invoked before every attempt.
	Refresh(Arc<dyn HeaderRefresher>),
}
impl RequestAuth {
	/// Wraps a per-request authorization callback.
	pub fn refresh(refresher: impl 'static + HeaderRefresher) -> Self {
		Self::Refresh(Arc::new(refresher))
	}
}
impl Debug for RequestAuth {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Static(_) => f.write_str("RequestAuth::Static(<redacted>)"),
			Self::Refresh(_) => f.write_str("RequestAuth::Refresh(..)"),
		}
	}
}

/// Outgoing request body.
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
	/// Structured payload serialized as JSON.
	Json(Value),
	/// Raw payload sent verbatim.
	Bytes(Vec<u8>),
}
impl RequestBody {
	fn into_bytes(self) -> Vec<u8> {
		match self {
			Self::Json(value) => value.to_string().into_bytes(),
			Self::Bytes(bytes) => bytes,
		}
	}
}

/// Description of one request to issue against the origin.
#[derive(Clone, Debug)]
pub struct RequestOptions {
	/// HTTP method.
	pub method: Method,
	/// Path appended to the configured origin.
	pub path: String,
	/// Optional body.
	pub data: Option<RequestBody>,
	/// Extra request headers.
	pub headers: BTreeMap<String, String>,
	/// Authorization override; `None` uses the managed credential.
	pub auth: Option<RequestAuth>,
	/// Disables JSON content negotiation and JSON response decoding.
	pub not_json: bool,
	/// Attempt ceiling overriding the scheduler default.
	pub max_attempts: Option<u32>,
}
impl RequestOptions {
	/// Creates a request description for `method` and `path`.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			data: None,
			headers: BTreeMap::new(),
			auth: None,
			not_json: false,
			max_attempts: None,
		}
	}

	/// Shorthand for a `GET` request.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` request.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Attaches a JSON body.
	pub fn with_json(mut self, value: Value) -> Self {
		self.data = Some(RequestBody::Json(value));

		self
	}

	/// Attaches a raw body.
	pub fn with_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
		self.data = Some(RequestBody::Bytes(bytes.into()));

		self
	}

	/// Adds a request header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Overrides authorization for this request.
	pub fn with_auth(mut self, auth: RequestAuth) -> Self {
		self.auth = Some(auth);

		self
	}

	/// Sends the body verbatim and returns the response body as bytes.
	pub fn not_json(mut self) -> Self {
		self.not_json = true;

		self
	}

	/// Overrides the attempt ceiling for this request.
	pub fn with_max_attempts(mut self, max: u32) -> Self {
		self.max_attempts = Some(max);

		self
	}

	/// Joins the configured origin and this request's path.
	pub fn uri(&self, origin: &Url) -> String {
		let base = origin.as_str().trim_end_matches('/');

		if self.path.starts_with('/') {
			format!("{base}{}", self.path)
		} else {
			format!("{base}/{}", self.path)
		}
	}

	/// Assembles the outbound request without authorization.
	pub(crate) fn build(&self, origin: &Url) -> Result<HttpRequest, ConfigError> {
		let mut builder = Request::builder().method(self.method.clone()).uri(self.uri(origin));

		for (name, value) in &self.headers {
			builder = builder.header(name.as_str(), value.as_str());
		}

		let body = self.data.clone().map(RequestBody::into_bytes).unwrap_or_default();
		let mut request = builder.body(body)?;
		let headers = request.headers_mut();

		if !self.not_json {
			if !headers.contains_key(CONTENT_TYPE) {
				headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
			}
			if !headers.contains_key(ACCEPT) {
				headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
			}
		}

		Ok(request)
	}
}

/// Sets the `Authorization` header; an empty value leaves the request untouched.
pub(crate) fn authorize(request: &mut HttpRequest, authorization: &str) -> Result<(), ConfigError> {
	if !authorization.is_empty() {
		let value = HeaderValue::from_str(authorization).map_err(oauth2::http::Error::from)?;

		request.headers_mut().insert(AUTHORIZATION, value);
	}

	Ok(())
}

/// Response body delivered to the caller.
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseBody {
	/// Decoded JSON document; an empty body decodes to `null`.
	Json(Value),
	/// Raw bytes for requests marked `not_json`.
	Bytes(Vec<u8>),
}

/// Successful origin response.
#[derive(Clone, Debug)]
pub struct Response {
	/// HTTP status code.
	pub status: u16,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body.
	pub body: ResponseBody,
	/// Dispatches performed for the request, including the successful one.
	pub attempts: u32,
}
impl Response {
	/// Decodes the body into `T`.
	pub fn json<T>(&self) -> Result<T, serde_json::Error>
	where
		T: DeserializeOwned,
	{
		match &self.body {
			ResponseBody::Json(value) => T::deserialize(value),
			ResponseBody::Bytes(bytes) => serde_json::from_slice(bytes),
		}
	}

	pub(crate) fn from_http(
		response: HttpResponse,
		not_json: bool,
		attempts: u32,
	) -> Result<Self, AttemptError> {
		let status = response.status().as_u16();
		let (parts, bytes) = response.into_parts();
		let body = if not_json {
			ResponseBody::Bytes(bytes)
		} else if bytes.iter().all(u8::is_ascii_whitespace) {
			ResponseBody::Json(Value::Null)
		} else {
			ResponseBody::Json(
				serde_json::from_slice(&bytes)
					.map_err(|source| AttemptError::Decode { status, source })?,
			)
		};

		Ok(Self { status, headers: parts.headers, body, attempts })
	}
}
