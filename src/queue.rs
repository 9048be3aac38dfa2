//! Pending work items and the handles callers await.

// std
use std::task::{Context, Poll};
// crates.io
use tokio::sync::oneshot;
// self
use crate::{_prelude::*, request::{RequestOptions, Response}};

/// One submitted request awaiting completion.
///
/// Owned by the [`RequestQueue`] while pending and moved into exactly one dispatch task while
/// in flight. The completion sender is consumed when the item settles, so a result is
/// delivered at most once.
#[derive(Debug)]
pub(crate) struct QueueItem {
	pub(crate) id: u64,
	pub(crate) options: RequestOptions,
	/// Failed dispatches so far.
	pub(crate) attempts: u32,
	/// Ask the request's own auth callback for a fresh value on the next attempt.
	pub(crate) force_auth_refresh: bool,
	completion: oneshot::Sender<Result<Response>>,
}
impl QueueItem {
	pub(crate) fn new(id: u64, options: RequestOptions) -> (Self, PendingResponse) {
		let (tx, rx) = oneshot::channel();
		let item = Self { id, options, attempts: 0, force_auth_refresh: false, completion: tx };

		(item, PendingResponse { rx })
	}

	pub(crate) fn complete(self, result: Result<Response>) {
		// The caller may have stopped waiting.
		let _ = self.completion.send(result);
	}
}

/// Ordered pending items; priority submissions and retries go to the head.
#[derive(Debug, Default)]
pub(crate) struct RequestQueue {
	items: VecDeque<QueueItem>,
}
impl RequestQueue {
	pub(crate) fn push_back(&mut self, item: QueueItem) {
		self.items.push_back(item);
	}

	pub(crate) fn push_front(&mut self, item: QueueItem) {
		self.items.push_front(item);
	}

	pub(crate) fn pop_front(&mut self) -> Option<QueueItem> {
		self.items.pop_front()
	}

	pub(crate) fn len(&self) -> usize {
		self.items.len()
	}

	pub(crate) fn drain(&mut self) -> Vec<QueueItem> {
		self.items.drain(..).collect()
	}
}

/// Future resolving with the outcome of a submitted request.
///
/// Resolves with [`Error::Abandoned`] if the dispatch path drops the request without settling
/// it, for example when a dispatch task panics.
#[derive(Debug)]
pub struct PendingResponse {
	rx: oneshot::Receiver<Result<Response>>,
}
impl Future for PendingResponse {
	type Output = Result<Response>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		Pin::new(&mut self.rx).poll(cx).map(|received| received.unwrap_or(Err(Error::Abandoned)))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn item(id: u64) -> (QueueItem, PendingResponse) {
		QueueItem::new(id, RequestOptions::get(format!("/items/{id}")))
	}

	#[test]
	fn head_insertions_are_served_first() {
		let mut queue = RequestQueue::default();

		for id in 1..=3 {
			queue.push_back(item(id).0);
		}

		queue.push_front(item(9).0);

		let order = std::iter::from_fn(|| queue.pop_front()).map(|item| item.id).collect::<Vec<_>>();

		assert_eq!(order, [9, 1, 2, 3]);
		assert_eq!(queue.len(), 0);
	}

	#[tokio::test]
	async fn completion_is_delivered_once() {
		let (item, pending) = item(1);

		item.complete(Err(Error::Shutdown));

		assert!(matches!(pending.await, Err(Error::Shutdown)));
	}

	#[tokio::test]
	async fn dropped_items_resolve_as_abandoned() {
		let (item, pending) = item(1);

		drop(item);

		assert!(matches!(pending.await, Err(Error::Abandoned)));
	}

	#[tokio::test]
	async fn drain_empties_the_queue() {
		let mut queue = RequestQueue::default();
		let (first, pending) = item(1);

		queue.push_back(first);
		queue.push_back(item(2).0);

		for item in queue.drain() {
			item.complete(Err(Error::Shutdown));
		}

		assert_eq!(queue.len(), 0);
		assert!(matches!(pending.await, Err(Error::Shutdown)));
	}
}
