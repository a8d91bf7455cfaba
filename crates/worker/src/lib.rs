//! Worker runtime primitives for stakegate services.
//!
//! * [`TaskClass`]: classification attached to every spawned task for tracing.
//! * [`spawn`] and friends: classified spawn entry points.
//! * [`spawn_periodic`]: supervised, cancellable fixed-interval tasks.

mod class;
pub mod periodic;
mod spawn;
mod token;

pub use class::TaskClass;
pub use periodic::{
	FirstTick, JobContext, PeriodicHandle, PeriodicJob, PeriodicSpec, ShutdownMode, ShutdownReport, TaskExit, TaskExitKind, Tick, TickReason,
	ZeroInterval, spawn_periodic,
};
pub use spawn::{join_error_panic_message, spawn, spawn_blocking, spawn_named_thread};
