//! Shared authorization credential with single-flight refresh.
//!
//! [`CredentialManager`] owns the cached [`Credential`] and the [`AuthStrategy`] that mints
//! new ones. Callers ask for a header via [`CredentialManager::header`]; the first caller that
//! finds the cache empty, expired, or force-bypassed becomes the sole refresh initiator, and
//! everyone arriving while that refresh is in flight joins a waiter list and receives the same
//! outcome. Each fetched credential carries a monotonic version so an authorization failure
//! observed with an old version cannot discard a credential that was already replaced.

mod credential;
mod metrics;
mod secret;
mod strategy;

pub use credential::*;
pub use metrics::RefreshMetrics;
pub use secret::TokenSecret;
pub use strategy::*;

// std
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	error::AuthError,
	http::Transport,
	obs::{self, Outcome, Stage, StageSpan},
};

type RefreshResult = Result<Credential, AuthError>;

/// Authorization header resolved for one dispatch attempt.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHeader {
	/// Header value; empty when no header should be attached.
	pub value: String,
	/// Version of the credential the header was rendered from.
	pub version: u64,
	/// `true` when the credential was fetched by this call or the refresh it joined.
	pub fetched: bool,
}
impl AuthHeader {
	fn new(credential: &Credential, fetched: bool) -> Self {
		Self { value: credential.header_value(), version: credential.version, fetched }
	}
}
impl Debug for AuthHeader {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthHeader")
			.field("value", &"<redacted>")
			.field("version", &self.version)
			.field("fetched", &self.fetched)
			.finish()
	}
}

#[derive(Default)]
struct CredentialState {
	current: Option<Credential>,
	// `Some` while a refresh is in flight.
	waiters: Option<Vec<oneshot::Sender<RefreshResult>>>,
}

enum Lookup {
	Cached(Credential),
	Join(oneshot::Receiver<RefreshResult>),
	Lead,
}

/// Owns the cached credential and coordinates refreshes.
pub struct CredentialManager {
	strategy: AuthStrategy,
	transport: Arc<dyn Transport>,
	state: Mutex<CredentialState>,
	versions: AtomicU64,
	metrics: RefreshMetrics,
}
impl CredentialManager {
	/// Creates a manager that fetches credentials with `strategy`, routing network-backed
	/// strategies through `transport`.
	pub fn new(strategy: AuthStrategy, transport: Arc<dyn Transport>) -> Self {
		Self {
			strategy,
			transport,
			state: Default::default(),
			versions: AtomicU64::new(0),
			metrics: Default::default(),
		}
	}

	/// Strategy used to mint credentials.
	pub fn strategy(&self) -> &AuthStrategy {
		&self.strategy
	}

	/// Refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns a copy of the cached credential, if any.
	pub fn current(&self) -> Option<Credential> {
		self.state.lock().current.clone()
	}

	/// Resolves the authorization header, refreshing when the cache cannot be reused.
	///
	/// The cached credential is reused only when `force_refresh` is `false` and its expiry is
	/// strictly in the future. Concurrent callers share a single in-flight refresh.
	pub async fn header(&self, force_refresh: bool) -> Result<AuthHeader, AuthError> {
		let lookup = {
			let mut state = self.state.lock();
			let now = OffsetDateTime::now_utc();

			match state.current.as_ref().filter(|c| !force_refresh && c.is_fresh_at(now)) {
				Some(credential) => Lookup::Cached(credential.clone()),
				None => match state.waiters.as_mut() {
					Some(waiters) => {
						let (tx, rx) = oneshot::channel();

						waiters.push(tx);

						Lookup::Join(rx)
					},
					None => {
						state.waiters = Some(Vec::new());

						Lookup::Lead
					},
				},
			}
		};

		match lookup {
			Lookup::Cached(credential) => {
				self.metrics.record_reuse();

				Ok(AuthHeader::new(&credential, false))
			},
			Lookup::Join(rx) => {
				self.metrics.record_join();

				let credential = rx.await.map_err(|_| AuthError::Abandoned)??;

				Ok(AuthHeader::new(&credential, true))
			},
			Lookup::Lead => {
				let credential = self.refresh().await?;

				Ok(AuthHeader::new(&credential, true))
			},
		}
	}

	/// Clears the cached credential if it still carries `version`.
	///
	/// Returns `true` when the credential was cleared.
	pub fn invalidate(&self, version: u64) -> bool {
		let mut state = self.state.lock();

		if state.current.as_ref().is_some_and(|c| c.version == version) {
			state.current = None;

			true
		} else {
			false
		}
	}

	async fn refresh(&self) -> RefreshResult {
		const STAGE: Stage = Stage::Refresh;

		let flight = RefreshFlight { state: &self.state, settled: false };
		let span = StageSpan::new(STAGE, self.strategy.as_str());

		obs::record_outcome(STAGE, Outcome::Attempt);
		self.metrics.record_attempt();

		let result = span
			.instrument(async {
				let raw = self.strategy.fetch(&self.transport).await?;
				let version = self.versions.fetch_add(1, Ordering::SeqCst) + 1;

				Credential::from_raw(raw, OffsetDateTime::now_utc(), version)
			})
			.await;

		match &result {
			Ok(credential) => {
				self.metrics.record_outcome(true);
				obs::record_outcome(STAGE, Outcome::Success);
				obs::log_refresh(self.strategy.as_str(), Some(credential.version), None);
			},
			Err(err) => {
				self.metrics.record_outcome(false);
				obs::record_outcome(STAGE, Outcome::Failure);
				obs::log_refresh(self.strategy.as_str(), None, Some(err));
			},
		}

		flight.settle(&result);

		result
	}
}
impl Debug for CredentialManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CredentialManager")
			.field("strategy", &self.strategy)
			.field("current", &self.state.lock().current)
			.finish()
	}
}

/// Releases refresh waiters exactly once, even if the initiating future is dropped.
struct RefreshFlight<'a> {
	state: &'a Mutex<CredentialState>,
	settled: bool,
}
impl RefreshFlight<'_> {
	fn settle(mut self, result: &RefreshResult) {
		let waiters = {
			let mut state = self.state.lock();

			if let Ok(credential) = result {
				state.current = Some(credential.clone());
			}

			state.waiters.take().unwrap_or_default()
		};

		self.settled = true;

		for waiter in waiters {
			let _ = waiter.send(result.clone());
		}
	}
}
impl Drop for RefreshFlight<'_> {
	fn drop(&mut self) {
		if !self.settled {
			// Dropping the senders wakes every waiter with `AuthError::Abandoned`.
			self.state.lock().waiters = None;
		}
	}
}
