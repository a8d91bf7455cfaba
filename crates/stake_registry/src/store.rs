//! Process-wide holder of the current registry snapshot.
//!
//! # Mental model
//!
//! * Readers pin an `Arc<RegistrySnapshot>` and resolve lookups against that
//!   immutable view. A later install never changes what a pinned reader sees.
//! * The refresher builds a complete replacement snapshot off to the side and
//!   publishes it with a single atomic swap.
//! * Before the first install the store is unready and reads return
//!   [`NotReady`].
//!
//! # Concurrency
//!
//! * Reads are wait-free (`ArcSwapOption` load).
//! * Installs publish via read-copy-update so the generation counter travels
//!   with the snapshot it labels; concurrent installs never lose a generation.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::RegistrySnapshot;

/// No snapshot has been installed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("registry snapshot not yet available")]
pub struct NotReady;

#[derive(Debug)]
struct Installed {
	generation: u64,
	snapshot: Arc<RegistrySnapshot>,
}

#[derive(Debug, Default)]
pub struct RegistryStore {
	current: ArcSwapOption<Installed>,
}

impl RegistryStore {
	/// Creates an unready store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the latest installed snapshot.
	pub fn current(&self) -> Result<Arc<RegistrySnapshot>, NotReady> {
		self.current.load().as_deref().map(|installed| Arc::clone(&installed.snapshot)).ok_or(NotReady)
	}

	/// Returns the latest snapshot together with its install generation.
	pub fn current_with_generation(&self) -> Result<(u64, Arc<RegistrySnapshot>), NotReady> {
		self.current
			.load()
			.as_deref()
			.map(|installed| (installed.generation, Arc::clone(&installed.snapshot)))
			.ok_or(NotReady)
	}

	/// Atomically replaces the current snapshot and returns its generation.
	///
	/// Generations start at 1 and increase by one per install.
	pub fn install(&self, snapshot: RegistrySnapshot) -> u64 {
		let snapshot = Arc::new(snapshot);
		let previous = self.current.rcu(|prev| {
			Some(Arc::new(Installed {
				generation: next_generation(prev.as_deref()),
				snapshot: Arc::clone(&snapshot),
			}))
		});
		next_generation(previous.as_deref())
	}

	pub fn is_ready(&self) -> bool {
		self.current.load().is_some()
	}

	/// Install generation of the current snapshot, 0 while unready.
	pub fn generation(&self) -> u64 {
		self.current.load().as_deref().map_or(0, |installed| installed.generation)
	}
}

fn next_generation(prev: Option<&Installed>) -> u64 {
	prev.map_or(0, |installed| installed.generation).wrapping_add(1)
}
