//! Demonstrates plugging an in-memory [`Transport`] into the scheduler to observe rate-limit
//! freezes and retries without any network access.
//!
//! 1. Implement [`Transport`] so every call returns an [`HttpResponse`] whatever its status.
//! 2. Hand the transport to [`Scheduler::with_transport`].
//! 3. Watch the first `429` freeze dispatch for the `Retry-After` delay before the retry.

// std
use std::{
	sync::atomic::{AtomicUsize, Ordering},
	time::Instant,
};
// crates.io
use color_eyre::Result;
use url::Url;
// self
use origin_scheduler::{
	RequestOptions, Scheduler, SchedulerConfig,
	http::{HttpRequest, HttpResponse, Transport, TransportFuture},
	oauth::oauth2::http::{HeaderValue, StatusCode, header::RETRY_AFTER},
};

/// Answers the first call with `429 Retry-After: 1` and every later call with `200`.
#[derive(Default)]
struct ThrottlingTransport {
	calls: AtomicUsize,
}
impl Transport for ThrottlingTransport {
	fn execute(&self, request: HttpRequest) -> TransportFuture<'_> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			let body = format!("{{\"path\":\"{}\",\"call\":{call}}}", request.uri().path());
			let mut response = HttpResponse::new(body.into_bytes());

			if call == 0 {
				*response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
				response.headers_mut().insert(RETRY_AFTER, HeaderValue::from_static("1"));
			}

			Ok(response)
		})
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let config = SchedulerConfig::new(Url::parse("https://origin.example.com")?)
		.with_checked_out_max(1)
		.with_log_requests(false);
	let scheduler = Scheduler::with_transport(config, ThrottlingTransport::default())?;
	let started = Instant::now();
	let first = scheduler.submit(RequestOptions::get("/reports/daily"));
	let second = scheduler.submit(RequestOptions::get("/reports/weekly"));
	let (first, second) = (first.await?, second.await?);

	println!("Daily report: {:?} after {} attempt(s).", first.body, first.attempts);
	println!("Weekly report: {:?} after {} attempt(s).", second.body, second.attempts);
	println!("Both finished {:?} after submission.", started.elapsed());

	Ok(())
}
