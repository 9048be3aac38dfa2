//! Scripted in-memory transport shared by the scheduler integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::{HashMap, VecDeque},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};
// crates.io
use origin_scheduler::{
	SchedulerConfig,
	error::TransportError,
	http::{HttpRequest, HttpResponse, Transport, TransportFuture},
	oauth::oauth2::http::{HeaderValue, StatusCode, header::AUTHORIZATION},
	url::Url,
};
use parking_lot::Mutex;
use tokio::time::Instant;

/// Canned outcome for one call.
#[derive(Clone, Debug)]
pub enum Reply {
	/// Structured response.
	Respond { status: u16, headers: Vec<(&'static str, String)>, body: Vec<u8> },
	/// Transport failure with no response.
	Fail,
	/// Panics inside the dispatch task.
	Panic,
}
impl Reply {
	pub fn json(status: u16, body: &str) -> Self {
		Self::Respond {
			status,
			headers: vec![("content-type", "application/json".into())],
			body: body.as_bytes().to_vec(),
		}
	}

	pub fn status(status: u16) -> Self {
		Self::Respond { status, headers: Vec::new(), body: Vec::new() }
	}

	pub fn with_header(self, name: &'static str, value: impl Into<String>) -> Self {
		match self {
			Self::Respond { status, mut headers, body } => {
				headers.push((name, value.into()));

				Self::Respond { status, headers, body }
			},
			other => other,
		}
	}
}

/// One observed call.
#[derive(Clone, Debug)]
pub struct Call {
	pub path: String,
	pub authorization: Option<String>,
	pub at: Instant,
}

/// Transport answering from per-path scripts; unscripted calls get `200 {"ok":true}`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
	scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
	calls: Mutex<Vec<Call>>,
	latency: Mutex<Duration>,
	delays: Mutex<HashMap<String, Duration>>,
	active: AtomicUsize,
	peak: AtomicUsize,
}
impl ScriptedTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn with_latency(latency: Duration) -> Arc<Self> {
		let transport = Self::new();

		*transport.latency.lock() = latency;

		transport
	}

	/// Overrides the latency for calls to `path`.
	pub fn delay(&self, path: &str, latency: Duration) {
		self.delays.lock().insert(path.to_owned(), latency);
	}

	/// Queues replies for `path`, served in order.
	pub fn script(&self, path: &str, replies: impl IntoIterator<Item = Reply>) {
		self.scripts.lock().entry(path.to_owned()).or_default().extend(replies);
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	pub fn calls_to(&self, path: &str) -> Vec<Call> {
		self.calls().into_iter().filter(|call| call.path == path).collect()
	}

	pub fn paths(&self) -> Vec<String> {
		self.calls().into_iter().map(|call| call.path).collect()
	}

	pub fn peak_concurrency(&self) -> usize {
		self.peak.load(Ordering::SeqCst)
	}

	fn next_reply(&self, path: &str) -> Reply {
		self.scripts
			.lock()
			.get_mut(path)
			.and_then(VecDeque::pop_front)
			.unwrap_or_else(|| Reply::json(200, r#"{"ok":true}"#))
	}
}
impl Transport for ScriptedTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		let path = request.uri().path().to_owned();

		self.calls.lock().push(Call {
			path: path.clone(),
			authorization: request
				.headers()
				.get(AUTHORIZATION)
				.and_then(|value| value.to_str().ok())
				.map(str::to_owned),
			at: Instant::now(),
		});

		let latency =
			self.delays.lock().get(&path).copied().unwrap_or_else(|| *self.latency.lock());

		Box::pin(async move {
			let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;

			self.peak.fetch_max(active, Ordering::SeqCst);

			if !latency.is_zero() {
				tokio::time::sleep(latency).await;
			}

			self.active.fetch_sub(1, Ordering::SeqCst);

			match self.next_reply(&path) {
				Reply::Respond { status, headers, body } => {
					let mut response = HttpResponse::new(body);

					*response.status_mut() =
						StatusCode::from_u16(status).expect("Scripted status should be valid.");

					for (name, value) in headers {
						response.headers_mut().insert(
							name,
							HeaderValue::from_str(&value).expect("Scripted header should be valid."),
						);
					}

					Ok(response)
				},
				Reply::Fail =>
					Err(TransportError::Io(std::io::Error::other(format!("{path} unreachable")))),
				Reply::Panic => panic!("Scripted panic for {path}."),
			}
		})
	}
}

pub fn config() -> SchedulerConfig {
	SchedulerConfig::new(Url::parse("https://api.example.com").expect("Fixture origin should parse."))
		.with_log_requests(false)
}
