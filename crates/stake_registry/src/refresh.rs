//! Background refresh of the registry store.
//!
//! # Lifecycle
//!
//! 1. Startup: [`RegistryRefresher::bootstrap`] performs one blocking refresh.
//!    The caller must treat its failure as fatal, since nothing can be
//!    authenticated without a first snapshot.
//! 2. Steady state: [`RegistryRefresher::spawn`] runs one refresh per interval
//!    on a supervised background task.
//! 3. Outage: a failed or timed-out fetch is logged and counted, and the
//!    previous snapshot stays installed until a later tick succeeds.
//! 4. Shutdown: cancelling the handle stops future ticks. An in-flight fetch
//!    may be dropped, but an install is a single synchronous swap and is never
//!    interrupted halfway.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use stakegate_worker::{FirstTick, JobContext, PeriodicHandle, PeriodicJob, PeriodicSpec, ShutdownMode, ShutdownReport, TaskClass, Tick, spawn_periodic};
use tokio::sync::broadcast;

use crate::source::{FetchError, RegistrySource};
use crate::{RegistrySnapshot, RegistryStore, SnapshotError};

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(600);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshConfig {
	pub interval: Duration,
	/// Upper bound for one upstream fetch.
	pub timeout: Duration,
}

impl Default for RefreshConfig {
	fn default() -> Self {
		Self {
			interval: DEFAULT_REFRESH_INTERVAL,
			timeout: DEFAULT_FETCH_TIMEOUT,
		}
	}
}

impl RefreshConfig {
	pub fn validate(&self) -> Result<(), RefreshConfigError> {
		if self.interval.is_zero() {
			return Err(RefreshConfigError::ZeroInterval);
		}
		if self.timeout.is_zero() {
			return Err(RefreshConfigError::ZeroTimeout);
		}
		Ok(())
	}
}

/// A [`RefreshConfig`] that cannot drive a refresher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RefreshConfigError {
	#[error("refresh interval must be non-zero")]
	ZeroInterval,

	#[error("fetch timeout must be non-zero")]
	ZeroTimeout,
}

/// Failure of one refresh attempt. Never reaches request callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
	#[error("upstream fetch failed: {0}")]
	UpstreamFetchFailed(#[from] FetchError),

	#[error("upstream fetch timed out after {timeout:?}")]
	UpstreamFetchTimedOut { timeout: Duration },

	#[error("upstream listing rejected: {0}")]
	InvalidSnapshot(#[from] SnapshotError),
}

/// Result of a successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
	pub generation: u64,
	pub participants: usize,
	pub fetched_at: DateTime<Utc>,
}

/// Broadcast to [`RefresherHandle::subscribe`] listeners after every attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshEvent {
	Installed(RefreshOutcome),
	Failed { error: RefreshError, consecutive_failures: u64 },
}

/// Point-in-time view of refresh health.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStatus {
	pub attempts: u64,
	pub installs: u64,
	pub consecutive_failures: u64,
	pub last_success: Option<DateTime<Utc>>,
	pub last_error: Option<String>,
}

/// Fetches the registry from a source and installs it into a store.
#[derive(Clone)]
pub struct RegistryRefresher {
	source: Arc<dyn RegistrySource>,
	store: Arc<RegistryStore>,
	config: RefreshConfig,
	status: Arc<Mutex<RefreshStatus>>,
}

impl std::fmt::Debug for RegistryRefresher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RegistryRefresher")
			.field("source", &self.source.describe())
			.field("config", &self.config)
			.finish_non_exhaustive()
	}
}

impl RegistryRefresher {
	pub fn new(source: Arc<dyn RegistrySource>, store: Arc<RegistryStore>, config: RefreshConfig) -> Self {
		Self {
			source,
			store,
			config,
			status: Arc::new(Mutex::new(RefreshStatus::default())),
		}
	}

	pub fn status(&self) -> RefreshStatus {
		self.status.lock().clone()
	}

	/// Fetches once, bounded by the configured timeout, and installs the result.
	///
	/// On failure the installed snapshot is left untouched.
	pub async fn refresh_once(&self) -> Result<RefreshOutcome, RefreshError> {
		let result = self.fetch_snapshot().await;

		let mut status = self.status.lock();
		status.attempts = status.attempts.wrapping_add(1);
		match result {
			Ok(snapshot) => {
				let participants = snapshot.len();
				let fetched_at = snapshot.fetched_at();
				let generation = self.store.install(snapshot);
				status.installs = status.installs.wrapping_add(1);
				status.consecutive_failures = 0;
				status.last_success = Some(fetched_at);
				status.last_error = None;
				drop(status);

				tracing::info!(source = %self.source.describe(), generation, participants, "registry.refresh.installed");
				Ok(RefreshOutcome {
					generation,
					participants,
					fetched_at,
				})
			}
			Err(err) => {
				status.consecutive_failures = status.consecutive_failures.wrapping_add(1);
				status.last_error = Some(err.to_string());
				let consecutive_failures = status.consecutive_failures;
				drop(status);

				tracing::warn!(
					source = %self.source.describe(),
					error = %err,
					consecutive_failures,
					serving_generation = self.store.generation(),
					"registry.refresh.failed"
				);
				Err(err)
			}
		}
	}

	/// One-off refresh for process startup.
	pub async fn bootstrap(&self) -> Result<RefreshOutcome, RefreshError> {
		self.refresh_once().await.inspect_err(|err| {
			tracing::error!(source = %self.source.describe(), error = %err, "registry.refresh.bootstrap_failed");
		})
	}

	/// Starts periodic refresh on the current Tokio runtime.
	///
	/// The first tick fires immediately if the store is still unready, and one
	/// interval from now otherwise. Fails without spawning anything if the
	/// interval or timeout is zero.
	pub fn spawn(&self) -> Result<RefresherHandle, RefreshConfigError> {
		self.config.validate()?;
		let first_tick = if self.store.is_ready() { FirstTick::Delayed } else { FirstTick::Immediate };
		let spec = PeriodicSpec::try_new("registry-refresher", TaskClass::Background, self.config.interval)
			.map_err(|_| RefreshConfigError::ZeroInterval)?
			.first_tick(first_tick);
		let task = spawn_periodic(spec, RefreshJob { refresher: self.clone() });
		Ok(RefresherHandle {
			task,
			refresher: self.clone(),
		})
	}

	async fn fetch_snapshot(&self) -> Result<RegistrySnapshot, RefreshError> {
		let participants = tokio::time::timeout(self.config.timeout, self.source.fetch())
			.await
			.map_err(|_| RefreshError::UpstreamFetchTimedOut { timeout: self.config.timeout })??;
		Ok(RegistrySnapshot::new(participants, Utc::now())?)
	}
}

struct RefreshJob {
	refresher: RegistryRefresher,
}

#[async_trait]
impl PeriodicJob for RefreshJob {
	type Evt = RefreshEvent;

	async fn run(&mut self, tick: Tick, ctx: &JobContext<Self::Evt>) -> Result<(), String> {
		tracing::debug!(seq = tick.seq, reason = ?tick.reason, "registry.refresh.tick");
		match self.refresher.refresh_once().await {
			Ok(outcome) => {
				ctx.emit(RefreshEvent::Installed(outcome));
				Ok(())
			}
			Err(error) => {
				let message = error.to_string();
				ctx.emit(RefreshEvent::Failed {
					error,
					consecutive_failures: self.refresher.status.lock().consecutive_failures,
				});
				Err(message)
			}
		}
	}
}

/// Handle to the running refresher. Dropping it stops refresh.
pub struct RefresherHandle {
	task: PeriodicHandle<RefreshEvent>,
	refresher: RegistryRefresher,
}

impl RefresherHandle {
	/// Requests an out-of-band refresh. Coalesces with pending requests.
	pub fn refresh_now(&self) {
		self.task.trigger();
	}

	pub fn subscribe(&self) -> broadcast::Receiver<RefreshEvent> {
		self.task.subscribe()
	}

	pub fn status(&self) -> RefreshStatus {
		self.refresher.status()
	}

	/// `false` once the refresh task has exited for any reason, including a
	/// panic inside the source.
	pub fn is_running(&self) -> bool {
		!self.task.is_finished()
	}

	pub async fn shutdown(&self, mode: ShutdownMode) -> ShutdownReport {
		self.task.shutdown(mode).await
	}
}
