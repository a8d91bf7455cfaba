use tokio_util::sync::CancellationToken;

/// Two-level lifecycle token for periodic tasks.
///
/// `stop` ends the task at the next tick boundary. `cancel` additionally
/// preempts an in-flight tick. Cancelling always implies stopping.
#[derive(Debug, Clone)]
pub(crate) struct LifecycleToken {
	cancel: CancellationToken,
	stop: CancellationToken,
}

impl LifecycleToken {
	pub fn new() -> Self {
		let cancel = CancellationToken::new();
		let stop = cancel.child_token();
		Self { cancel, stop }
	}

	/// Requests a stop after the current tick finishes.
	pub fn stop(&self) {
		self.stop.cancel();
	}

	/// Requests immediate cancellation, preempting the current tick.
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	pub async fn stopped(&self) {
		self.stop.cancelled().await;
	}

	pub async fn cancelled(&self) {
		self.cancel.cancelled().await;
	}
}
