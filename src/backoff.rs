//! Shared freeze deadline gating every outbound call.

// crates.io
use tokio::time::{self, Instant};
// self
use crate::{_prelude::*, obs};

// Deadline used when `now + duration` cannot be represented.
const FAR_FUTURE: StdDuration = StdDuration::from_secs(86_400 * 365 * 30);

/// Owns the single "frozen until" deadline shared by all dispatch tasks.
///
/// Freezes compose by taking the later deadline, so overlapping rate-limit signals can only
/// extend a freeze. The deadline is cleared by the waiter that sees its own observed deadline
/// elapse without a later extension.
#[derive(Debug, Default)]
pub struct BackoffController {
	deadline: Mutex<Option<Instant>>,
}
impl BackoffController {
	/// Creates an unfrozen controller.
	pub fn new() -> Self {
		Self::default()
	}

	/// Extends the freeze to `now + duration` unless a later deadline is already set.
	///
	/// Durations too large to add to the current instant saturate at roughly thirty years.
	pub fn freeze_for(&self, duration: StdDuration) {
		let now = Instant::now();
		let candidate = now.checked_add(duration).unwrap_or_else(|| now + FAR_FUTURE);
		let mut deadline = self.deadline.lock();

		if deadline.is_none_or(|current| current < candidate) {
			*deadline = Some(candidate);

			obs::log_freeze(duration);
		}
	}

	/// Returns the current deadline, if a freeze is active or awaiting clearance.
	pub fn frozen_until(&self) -> Option<Instant> {
		*self.deadline.lock()
	}

	/// Suspends until no freeze is in effect.
	pub async fn wait_until_unfrozen(&self) {
		loop {
			let Some(observed) = self.frozen_until() else {
				return;
			};

			time::sleep_until(observed).await;

			let settled = {
				let mut deadline = self.deadline.lock();

				match *deadline {
					Some(current) if current == observed => {
						*deadline = None;

						true
					},
					None => true,
					// Extended while we slept.
					Some(_) => false,
				}
			};

			if settled {
				return;
			}
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn freezes_only_extend() {
		let backoff = BackoffController::new();
		let start = Instant::now();

		backoff.freeze_for(StdDuration::from_secs(5));
		backoff.freeze_for(StdDuration::from_secs(2));

		assert_eq!(backoff.frozen_until(), Some(start + StdDuration::from_secs(5)));

		backoff.freeze_for(StdDuration::from_secs(8));

		assert_eq!(backoff.frozen_until(), Some(start + StdDuration::from_secs(8)));
	}

	#[tokio::test(start_paused = true)]
	async fn unrepresentable_freezes_saturate() {
		let backoff = BackoffController::new();
		let start = Instant::now();

		backoff.freeze_for(StdDuration::MAX);

		let deadline = backoff.frozen_until().expect("Huge freezes must still apply.");

		assert_eq!(deadline, start + FAR_FUTURE);

		backoff.freeze_for(StdDuration::from_secs(u64::MAX));
		backoff.freeze_for(StdDuration::from_secs(5));

		assert_eq!(backoff.frozen_until(), Some(deadline));
	}

	#[tokio::test(start_paused = true)]
	async fn waiting_clears_the_elapsed_deadline() {
		let backoff = BackoffController::new();
		let start = Instant::now();

		backoff.wait_until_unfrozen().await;

		assert_eq!(Instant::now(), start, "Unfrozen controllers must not suspend.");

		backoff.freeze_for(StdDuration::from_secs(3));
		backoff.wait_until_unfrozen().await;

		assert!(Instant::now() >= start + StdDuration::from_secs(3));
		assert_eq!(backoff.frozen_until(), None);
	}

	#[tokio::test(start_paused = true)]
	async fn waiters_follow_extensions() {
		let backoff = Arc::new(BackoffController::new());
		let start = Instant::now();

		backoff.freeze_for(StdDuration::from_secs(1));

		let waiter = tokio::spawn({
			let backoff = backoff.clone();

			async move {
				backoff.wait_until_unfrozen().await;

				Instant::now()
			}
		});

		time::sleep(StdDuration::from_millis(500)).await;
		backoff.freeze_for(StdDuration::from_secs(4));

		let resumed = waiter.await.expect("Waiter task should not panic.");

		assert!(resumed >= start + StdDuration::from_millis(4_500));
		assert_eq!(backoff.frozen_until(), None);
	}
}
