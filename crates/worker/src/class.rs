/// Execution classes used for worker scheduling and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Per-request work on the serving path. Must never wait on upstream I/O.
	Request,
	/// Long-lived background work such as registry refresh.
	Background,
	/// Blocking I/O executed on blocking pools or dedicated threads.
	IoBlocking,
}

impl TaskClass {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Request => "request",
			Self::Background => "background",
			Self::IoBlocking => "io_blocking",
		}
	}
}
