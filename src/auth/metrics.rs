// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing how header lookups were served.
///
/// Every [`CredentialManager::header`](crate::auth::CredentialManager::header) call lands in
/// exactly one of three buckets: it reused the cached credential, joined a refresh already in
/// flight, or led a new refresh. Led refreshes are further split into successes and failures.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	reused: AtomicU64,
	joined: AtomicU64,
	led: AtomicU64,
	fetched: AtomicU64,
	failed: AtomicU64,
}
impl RefreshMetrics {
	/// Lookups answered from the cache without touching the strategy.
	pub fn reuses(&self) -> u64 {
		self.reused.load(Ordering::Relaxed)
	}

	/// Lookups that waited on another caller's refresh.
	pub fn joins(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	/// Strategy invocations.
	pub fn attempts(&self) -> u64 {
		self.led.load(Ordering::Relaxed)
	}

	/// Strategy invocations that produced a valid credential.
	pub fn successes(&self) -> u64 {
		self.fetched.load(Ordering::Relaxed)
	}

	/// Strategy invocations that failed.
	pub fn failures(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	pub(crate) fn record_reuse(&self) {
		self.reused.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_join(&self) {
		self.joined.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_attempt(&self) {
		self.led.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_outcome(&self, ok: bool) {
		let counter = if ok { &self.fetched } else { &self.failed };

		counter.fetch_add(1, Ordering::Relaxed);
	}
}
