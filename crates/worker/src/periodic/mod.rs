//! Supervised periodic tasks.
//!
//! A [`PeriodicJob`] runs once per tick on a fixed interval until its
//! [`PeriodicHandle`] stops or cancels it. Ticks never overlap: a tick that
//! overruns the interval delays the next one instead of stacking. A failed
//! tick is recorded and logged but never ends the task.
//!
//! Cancellation preempts a tick only at its await points, so synchronous
//! sections of a job (for example publishing a value into shared state) are
//! never torn.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify, broadcast};
use tokio::time::MissedTickBehavior;

use crate::TaskClass;
use crate::token::LifecycleToken;

mod join_ctrl;

use join_ctrl::JoinCtrl;

const EVENT_BUFFER: usize = 64;

/// Why a tick fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReason {
	/// Regular interval tick.
	Scheduled,
	/// Out-of-band tick requested through [`PeriodicHandle::trigger`].
	Triggered,
}

/// Metadata for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
	/// 1-based sequence number of this tick.
	pub seq: u64,
	pub reason: TickReason,
}

/// Job executed once per tick.
#[async_trait]
pub trait PeriodicJob: Send + 'static {
	type Evt: Clone + Send + 'static;

	async fn run(&mut self, tick: Tick, ctx: &JobContext<Self::Evt>) -> Result<(), String>;
}

/// Per-task context handed to every tick.
pub struct JobContext<Evt> {
	events: broadcast::Sender<Evt>,
	token: LifecycleToken,
}

impl<Evt> JobContext<Evt>
where
	Evt: Clone + Send + 'static,
{
	/// Emits one event to subscribers. Dropped if nobody listens.
	pub fn emit(&self, evt: Evt) {
		let _ = self.events.send(evt);
	}
}

/// When the first tick fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstTick {
	Immediate,
	/// One full interval after spawn.
	Delayed,
}

/// Builder spec for one periodic task.
#[derive(Debug, Clone)]
pub struct PeriodicSpec {
	pub(crate) name: String,
	pub(crate) class: TaskClass,
	pub(crate) interval: Duration,
	pub(crate) first_tick: FirstTick,
}

impl PeriodicSpec {
	/// # Panics
	///
	/// Panics if `interval` is zero. Use [`Self::try_new`] for intervals that
	/// come from configuration.
	pub fn new(name: impl Into<String>, class: TaskClass, interval: Duration) -> Self {
		match Self::try_new(name, class, interval) {
			Ok(spec) => spec,
			Err(err) => panic!("{err}"),
		}
	}

	pub fn try_new(name: impl Into<String>, class: TaskClass, interval: Duration) -> Result<Self, ZeroInterval> {
		let name = name.into();
		if interval.is_zero() {
			return Err(ZeroInterval { name });
		}
		Ok(Self {
			name,
			class,
			interval,
			first_tick: FirstTick::Immediate,
		})
	}

	#[must_use]
	pub fn first_tick(mut self, first_tick: FirstTick) -> Self {
		self.first_tick = first_tick;
		self
	}

}

/// A periodic task was configured with a zero interval.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("periodic task {name:?} needs a non-zero interval")]
pub struct ZeroInterval {
	pub name: String,
}

/// Exit classification for a finished periodic task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum TaskExitKind {
	/// Stopped at a tick boundary.
	Stopped,
	/// Cancelled, possibly mid-tick.
	Cancelled,
	Panicked,
}

/// Exit summary for a finished periodic task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskExit {
	kind: TaskExitKind,
	message: Option<String>,
}

impl TaskExit {
	pub fn kind(&self) -> TaskExitKind {
		self.kind
	}

	pub fn message(&self) -> Option<&str> {
		self.message.as_deref()
	}
}

/// Shutdown mode for periodic tasks.
#[derive(Debug, Clone, Copy)]
pub enum ShutdownMode {
	/// Cancel now, preempting any in-flight tick.
	Immediate,
	/// Let the in-flight tick finish, but give up after `timeout`.
	Graceful { timeout: Duration },
}

/// Shutdown report for one periodic task.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
	completed: bool,
	timed_out: bool,
	last_exit: Option<TaskExit>,
}

impl ShutdownReport {
	pub fn completed(&self) -> bool {
		self.completed
	}

	pub fn timed_out(&self) -> bool {
		self.timed_out
	}

	pub fn last_exit(&self) -> Option<&TaskExit> {
		self.last_exit.as_ref()
	}
}

#[derive(Default)]
struct TaskState {
	ticks: AtomicU64,
	failures: AtomicU64,
	consecutive_failures: AtomicU64,
	last_exit: Mutex<Option<TaskExit>>,
	/// Set by the supervisor once `last_exit` is recorded.
	finished: AtomicBool,
}

/// Handle for one periodic task. Dropping the handle cancels the task.
pub struct PeriodicHandle<Evt>
where
	Evt: Clone + Send + 'static,
{
	name: String,
	token: LifecycleToken,
	trigger: Arc<Notify>,
	events: broadcast::Sender<Evt>,
	state: Arc<TaskState>,
	join_ctrl: Arc<JoinCtrl>,
}

impl<Evt> Drop for PeriodicHandle<Evt>
where
	Evt: Clone + Send + 'static,
{
	fn drop(&mut self) {
		self.token.cancel();
	}
}

impl<Evt> PeriodicHandle<Evt>
where
	Evt: Clone + Send + 'static,
{
	/// Number of ticks started so far.
	pub fn ticks(&self) -> u64 {
		self.state.ticks.load(Ordering::Acquire)
	}

	/// Total failed ticks.
	pub fn failures(&self) -> u64 {
		self.state.failures.load(Ordering::Acquire)
	}

	/// Failed ticks since the last successful one.
	pub fn consecutive_failures(&self) -> u64 {
		self.state.consecutive_failures.load(Ordering::Acquire)
	}

	pub fn subscribe(&self) -> broadcast::Receiver<Evt> {
		self.events.subscribe()
	}

	/// Requests one out-of-band tick. Repeated calls before the tick starts
	/// coalesce into a single tick.
	pub fn trigger(&self) {
		self.trigger.notify_one();
	}

	/// Cancels the task immediately without waiting for it.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Returns whether the task has exited, including by panic, whether or
	/// not anyone has joined it yet.
	pub fn is_finished(&self) -> bool {
		self.state.finished.load(Ordering::Acquire) || self.join_ctrl.is_done()
	}

	pub async fn last_exit(&self) -> Option<TaskExit> {
		self.state.last_exit.lock().await.clone()
	}

	pub async fn shutdown(&self, mode: ShutdownMode) -> ShutdownReport {
		match mode {
			ShutdownMode::Immediate => {
				self.token.cancel();
				self.join_ctrl.join().await;
				ShutdownReport {
					completed: true,
					timed_out: false,
					last_exit: self.last_exit().await,
				}
			}
			ShutdownMode::Graceful { timeout } => {
				self.token.stop();
				let completed = self.join_ctrl.join_with_timeout(timeout).await;
				if !completed {
					self.token.cancel();
				}
				ShutdownReport {
					completed,
					timed_out: !completed,
					last_exit: self.last_exit().await,
				}
			}
		}
	}

	/// Tries a graceful shutdown first and forces an immediate one on timeout.
	pub async fn shutdown_graceful_or_force(&self, timeout: Duration) -> ShutdownReport {
		let report = self.shutdown(ShutdownMode::Graceful { timeout }).await;
		if report.timed_out() {
			tracing::warn!(task = %self.name, "graceful shutdown timed out; forcing immediate");
			return self.shutdown(ShutdownMode::Immediate).await;
		}
		report
	}
}

/// Spawns a periodic task on the current Tokio runtime.
pub fn spawn_periodic<J>(spec: PeriodicSpec, job: J) -> PeriodicHandle<J::Evt>
where
	J: PeriodicJob,
{
	let (events, _) = broadcast::channel(EVENT_BUFFER);
	let token = LifecycleToken::new();
	let trigger = Arc::new(Notify::new());
	let state = Arc::new(TaskState::default());

	let task = crate::spawn(
		spec.class,
		run_periodic(
			spec.clone(),
			job,
			JobContext {
				events: events.clone(),
				token: token.clone(),
			},
			Arc::clone(&trigger),
			Arc::clone(&state),
		),
	);

	// Watches the loop task so panics are recorded as an exit.
	let watch_state = Arc::clone(&state);
	let watch_name = spec.name.clone();
	let supervisor = crate::spawn(spec.class, async move {
		let exit = match task.await {
			Ok(exit) => exit,
			Err(err) if err.is_cancelled() => TaskExit {
				kind: TaskExitKind::Cancelled,
				message: None,
			},
			Err(err) => {
				let message = crate::join_error_panic_message(err);
				tracing::error!(task = %watch_name, panic = ?message, "worker.periodic.panicked");
				TaskExit {
					kind: TaskExitKind::Panicked,
					message,
				}
			}
		};
		*watch_state.last_exit.lock().await = Some(exit);
		watch_state.finished.store(true, Ordering::Release);
	});

	PeriodicHandle {
		name: spec.name,
		token,
		trigger,
		events,
		state,
		join_ctrl: Arc::new(JoinCtrl::new(supervisor)),
	}
}

async fn run_periodic<J>(spec: PeriodicSpec, mut job: J, ctx: JobContext<J::Evt>, trigger: Arc<Notify>, state: Arc<TaskState>) -> TaskExit
where
	J: PeriodicJob,
{
	let start = match spec.first_tick {
		FirstTick::Immediate => tokio::time::Instant::now(),
		FirstTick::Delayed => tokio::time::Instant::now() + spec.interval,
	};
	let mut interval = tokio::time::interval_at(start, spec.interval);
	interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
	let token = ctx.token.clone();

	let kind = loop {
		let reason = tokio::select! {
			biased;
			_ = token.stopped() => break TaskExitKind::Stopped,
			_ = trigger.notified() => {
				interval.reset();
				TickReason::Triggered
			}
			_ = interval.tick() => TickReason::Scheduled,
		};

		let seq = state.ticks.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
		let tick = Tick { seq, reason };

		let outcome = tokio::select! {
			biased;
			_ = token.cancelled() => break TaskExitKind::Cancelled,
			res = job.run(tick, &ctx) => res,
		};

		match outcome {
			Ok(()) => {
				state.consecutive_failures.store(0, Ordering::Release);
				tracing::trace!(task = %spec.name, seq, reason = ?reason, "worker.periodic.tick");
			}
			Err(err) => {
				state.failures.fetch_add(1, Ordering::AcqRel);
				let streak = state.consecutive_failures.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
				tracing::debug!(task = %spec.name, seq, streak, error = %err, "worker.periodic.tick_failed");
			}
		}
	};

	if token.is_cancelled() && kind == TaskExitKind::Stopped {
		return TaskExit {
			kind: TaskExitKind::Cancelled,
			message: None,
		};
	}
	tracing::debug!(task = %spec.name, kind = ?kind, "worker.periodic.exit");
	TaskExit { kind, message: None }
}
