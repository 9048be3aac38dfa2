//! Concurrency-limited dispatcher driving the request queue.
//!
//! A [`Scheduler`] owns one background driver task. The driver wakes on a fixed interval and
//! whenever a request is submitted or an attempt completes, then checks out queued items while
//! fewer than `checked_out_max` are in flight. Each checked-out item runs in its own task:
//! resolve authorization, wait out any freeze, call the [`Transport`], and either deliver the
//! response or hand the failure to the [`RetryPolicy`].

mod metrics;

pub use metrics::DispatchMetrics;

// std
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
// crates.io
use tokio::{
	sync::Notify,
	task::JoinHandle,
	time::{self, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	auth::CredentialManager,
	backoff::BackoffController,
	config::SchedulerConfig,
	error::{AttemptError, AuthError, ConfigError},
	http::Transport,
	obs::{self, Outcome, Stage, StageSpan},
	queue::{PendingResponse, QueueItem, RequestQueue},
	request::{self, RequestAuth, RequestOptions, Response},
	retry::{HeaderSource, RetryPolicy, Verdict},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Single-origin request scheduler.
///
/// Must be created inside a Tokio runtime. Dropping the scheduler has the same effect as
/// [`Scheduler::shutdown`].
pub struct Scheduler {
	shared: Arc<Shared>,
	driver: JoinHandle<()>,
}
impl Scheduler {
	/// Creates a scheduler backed by the reqwest transport.
	#[cfg(feature = "reqwest")]
	pub fn new(config: SchedulerConfig) -> Result<Self, ConfigError> {
		let transport = ReqwestTransport::new(config.verify_transport_certificates)?;

		Self::with_transport(config, transport)
	}

	/// Creates a scheduler that issues every call, token exchanges included, through
	/// `transport`.
	pub fn with_transport(
		config: SchedulerConfig,
		transport: impl Transport,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let transport: Arc<dyn Transport> = Arc::new(transport);
		let credentials = config
			.authorisation
			.clone()
			.map(|strategy| CredentialManager::new(strategy, Arc::clone(&transport)));
		let shared = Arc::new(Shared {
			policy: RetryPolicy::from_config(&config),
			config,
			transport,
			credentials,
			backoff: BackoffController::new(),
			queue: Default::default(),
			in_flight: AtomicUsize::new(0),
			next_id: AtomicU64::new(0),
			nudge: Notify::new(),
			closed: AtomicBool::new(false),
			metrics: Default::default(),
		});
		let driver = tokio::spawn(Shared::drive(Arc::clone(&shared)));

		Ok(Self { shared, driver })
	}

	/// Appends a request to the queue.
	pub fn submit(&self, options: RequestOptions) -> PendingResponse {
		self.shared.enqueue(options, false)
	}

	/// Inserts a request at the head of the queue.
	pub fn submit_priority(&self, options: RequestOptions) -> PendingResponse {
		self.shared.enqueue(options, true)
	}

	/// Number of requests waiting for a dispatch slot.
	pub fn queued(&self) -> usize {
		self.shared.queue.lock().len()
	}

	/// Number of requests currently checked out.
	pub fn in_flight(&self) -> usize {
		self.shared.in_flight.load(Ordering::SeqCst)
	}

	/// Active configuration.
	pub fn config(&self) -> &SchedulerConfig {
		&self.shared.config
	}

	/// Managed credential, when a strategy is configured.
	pub fn credentials(&self) -> Option<&CredentialManager> {
		self.shared.credentials.as_ref()
	}

	/// Shared freeze controller.
	pub fn backoff(&self) -> &BackoffController {
		&self.shared.backoff
	}

	/// Dispatch counters.
	pub fn metrics(&self) -> &DispatchMetrics {
		&self.shared.metrics
	}

	/// Stops the driver and fails every queued request with [`Error::Shutdown`].
	///
	/// Requests already in flight finish their current attempt; a retry after shutdown also
	/// fails with [`Error::Shutdown`].
	pub fn shutdown(&self) {
		self.shared.closed.store(true, Ordering::SeqCst);
		self.driver.abort();

		let pending = self.shared.queue.lock().drain();

		for item in pending {
			item.complete(Err(Error::Shutdown));
		}
	}

	/// Returns `true` once [`Self::shutdown`] has run.
	pub fn is_shut_down(&self) -> bool {
		self.shared.closed.load(Ordering::SeqCst)
	}
}
impl Debug for Scheduler {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Scheduler")
			.field("origin", &self.shared.config.origin.as_str())
			.field("queued", &self.queued())
			.field("in_flight", &self.in_flight())
			.field("closed", &self.is_shut_down())
			.finish()
	}
}
impl Drop for Scheduler {
	fn drop(&mut self) {
		self.shutdown();
	}
}

enum Failure {
	/// Completes the item immediately.
	Terminal(Error),
	/// Goes through the retry policy.
	Attempt(AttemptError, HeaderSource),
}

struct Shared {
	config: SchedulerConfig,
	transport: Arc<dyn Transport>,
	credentials: Option<CredentialManager>,
	backoff: BackoffController,
	policy: RetryPolicy,
	queue: Mutex<RequestQueue>,
	in_flight: AtomicUsize,
	next_id: AtomicU64,
	nudge: Notify,
	closed: AtomicBool,
	metrics: DispatchMetrics,
}
impl Shared {
	async fn drive(self: Arc<Self>) {
		let mut ticker = time::interval(self.config.repeated_trigger_delay);

		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = ticker.tick() => {},
				_ = self.nudge.notified() => {},
			}

			self.trigger();
		}
	}

	/// Checks out head items until the queue is empty or the ceiling is reached.
	fn trigger(self: &Arc<Self>) {
		loop {
			let item = {
				let mut queue = self.queue.lock();

				if self.closed.load(Ordering::SeqCst)
					|| self.in_flight.load(Ordering::SeqCst) >= self.config.checked_out_max
				{
					return;
				}

				let Some(item) = queue.pop_front() else {
					return;
				};

				self.in_flight.fetch_add(1, Ordering::SeqCst);

				item
			};

			tokio::spawn(Arc::clone(self).dispatch(item));
		}
	}

	fn enqueue(&self, options: RequestOptions, priority: bool) -> PendingResponse {
		let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
		let (item, pending) = QueueItem::new(id, options);

		{
			let mut queue = self.queue.lock();

			if self.closed.load(Ordering::SeqCst) {
				drop(queue);
				item.complete(Err(Error::Shutdown));

				return pending;
			}
			if priority {
				queue.push_front(item);
			} else {
				queue.push_back(item);
			}
		}

		self.nudge.notify_one();

		pending
	}

	fn requeue(&self, item: QueueItem) {
		let mut queue = self.queue.lock();

		if self.closed.load(Ordering::SeqCst) {
			drop(queue);
			item.complete(Err(Error::Shutdown));
		} else {
			queue.push_front(item);
		}
	}

	async fn dispatch(self: Arc<Self>, mut item: QueueItem) {
		const STAGE: Stage = Stage::Dispatch;

		let _slot = InFlightSlot(&self);
		let span = StageSpan::new(STAGE, "attempt");

		obs::record_outcome(STAGE, Outcome::Attempt);
		self.metrics.record_attempt();

		let outcome = span.instrument(self.attempt(&mut item)).await;
		let verdict = match outcome {
			Ok(response) => {
				self.metrics.record_success();
				obs::record_outcome(STAGE, Outcome::Success);
				item.complete(Ok(response));

				return;
			},
			Err(Failure::Terminal(error)) => Verdict::Fail(item, error),
			Err(Failure::Attempt(error, source)) => {
				obs::log_attempt_failure(item.id, item.attempts + 1, &error);

				self.policy.on_failure(item, error, source, self.credentials.as_ref(), &self.backoff)
			},
		};

		match verdict {
			Verdict::Requeue(item) => {
				self.metrics.record_retry();
				obs::record_outcome(STAGE, Outcome::Retry);
				self.requeue(item);
			},
			Verdict::Fail(item, error) => {
				self.metrics.record_failure();
				obs::record_outcome(STAGE, Outcome::Failure);
				obs::log_terminal(item.id, &error);
				item.complete(Err(error));
			},
		}
	}

	async fn attempt(&self, item: &mut QueueItem) -> Result<Response, Failure> {
		let mut request =
			item.options.build(&self.config.origin).map_err(|e| Failure::Terminal(e.into()))?;
		let (authorization, source) =
			self.resolve_authorization(item).await.map_err(|e| Failure::Terminal(e.into()))?;

		request::authorize(&mut request, &authorization).map_err(|e| Failure::Terminal(e.into()))?;

		self.backoff.wait_until_unfrozen().await;

		let attempt = item.attempts + 1;

		if self.config.log_requests {
			obs::log_request(item.id, request.method().as_str(), &request.uri().to_string(), attempt);
		}

		let response = self
			.transport
			.execute(request)
			.await
			.map_err(|e| Failure::Attempt(e.into(), source))?;
		let response = self.policy.classify(response).map_err(|e| Failure::Attempt(e, source))?;

		Response::from_http(response, item.options.not_json, attempt)
			.map_err(|e| Failure::Attempt(e, source))
	}

	async fn resolve_authorization(
		&self,
		item: &mut QueueItem,
	) -> Result<(String, HeaderSource), AuthError> {
		let force = std::mem::take(&mut item.force_auth_refresh);

		match &item.options.auth {
			Some(RequestAuth::Static(value)) => Ok((value.clone(), HeaderSource::Fixed)),
			Some(RequestAuth::Refresh(refresher)) =>
				Ok((refresher.refresh(force).await?, HeaderSource::Callback)),
			None => match &self.credentials {
				Some(credentials) => {
					let header = credentials.header(force).await?;

					if header.fetched
						&& credentials.strategy().is_remote()
						&& !self.config.post_auth_fetch_freeze.is_zero()
					{
						self.backoff.freeze_for(self.config.post_auth_fetch_freeze);
					}

					Ok((header.value, HeaderSource::Managed(header.version)))
				},
				None => Ok((String::new(), HeaderSource::Fixed)),
			},
		}
	}
}

/// Releases one in-flight slot and wakes the driver, on completion or unwind.
struct InFlightSlot<'a>(&'a Shared);
impl Drop for InFlightSlot<'_> {
	fn drop(&mut self) {
		self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
		self.0.nudge.notify_one();
	}
}
