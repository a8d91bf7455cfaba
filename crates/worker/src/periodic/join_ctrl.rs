use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// Join coordination for the periodic task.
///
/// The first caller takes the join handle and awaits it. Concurrent callers
/// wait on the `done` watch until the owner publishes completion. A caller
/// that times out puts the handle back so a later shutdown can finish the job.
pub(super) struct JoinCtrl {
	handle: Mutex<Option<JoinHandle<()>>>,
	done_tx: watch::Sender<bool>,
}

impl JoinCtrl {
	pub(super) fn new(handle: JoinHandle<()>) -> Self {
		let (done_tx, _) = watch::channel(false);
		Self {
			handle: Mutex::new(Some(handle)),
			done_tx,
		}
	}

	pub(super) fn is_done(&self) -> bool {
		*self.done_tx.borrow()
	}

	/// Waits until the task has completed. Safe to call from many tasks.
	pub(super) async fn join(&self) {
		self.join_until(None).await;
	}

	/// Waits at most `timeout`. Returns `true` if the task completed.
	pub(super) async fn join_with_timeout(&self, timeout: Duration) -> bool {
		self.join_until(Some(tokio::time::Instant::now() + timeout)).await
	}

	async fn join_until(&self, deadline: Option<tokio::time::Instant>) -> bool {
		let mut done_rx = self.done_tx.subscribe();
		loop {
			if *done_rx.borrow_and_update() {
				return true;
			}

			let taken = self.handle.lock().await.take();
			let Some(mut handle) = taken else {
				// Another caller owns the handle; wait for its verdict.
				let changed = async {
					let _ = done_rx.changed().await;
				};
				match deadline {
					Some(deadline) => {
						tokio::select! {
							_ = changed => continue,
							_ = tokio::time::sleep_until(deadline) => return self.is_done(),
						}
					}
					None => {
						changed.await;
						continue;
					}
				}
			};

			let finished = match deadline {
				Some(deadline) => {
					tokio::select! {
						_ = &mut handle => true,
						_ = tokio::time::sleep_until(deadline) => false,
					}
				}
				None => {
					let _ = (&mut handle).await;
					true
				}
			};

			if finished {
				self.done_tx.send_replace(true);
				return true;
			}
			*self.handle.lock().await = Some(handle);
			// Wake waiters so one of them can take the handle back.
			self.done_tx.send_modify(|_| {});
			return false;
		}
	}
}
