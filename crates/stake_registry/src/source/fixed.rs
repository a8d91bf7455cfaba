use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{FetchError, RegistrySource};
use crate::Participant;

/// In-memory source returning whatever listing or failure was last set.
///
/// Serves static deployments configured with an inline participant list and
/// lets tests script upstream outages.
#[derive(Debug, Clone)]
pub struct FixedSource {
	next: Arc<RwLock<Result<Vec<Participant>, FetchError>>>,
}

impl FixedSource {
	pub fn new(participants: Vec<Participant>) -> Self {
		Self {
			next: Arc::new(RwLock::new(Ok(participants))),
		}
	}

	/// Replaces the listing returned by subsequent fetches.
	pub fn set(&self, participants: Vec<Participant>) {
		*self.next.write() = Ok(participants);
	}

	/// Makes subsequent fetches fail until the next [`Self::set`].
	pub fn fail_with(&self, error: FetchError) {
		*self.next.write() = Err(error);
	}
}

#[async_trait]
impl RegistrySource for FixedSource {
	fn describe(&self) -> String {
		"fixed".to_string()
	}

	async fn fetch(&self) -> Result<Vec<Participant>, FetchError> {
		self.next.read().clone()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn clones_share_the_scripted_result() {
		let source = FixedSource::new(vec![Participant::new("A", 1)]);
		let clone = source.clone();
		clone.fail_with(FetchError::Transport("down".into()));
		assert_eq!(source.fetch().await.unwrap_err(), FetchError::Transport("down".into()));

		clone.set(vec![Participant::new("B", 2)]);
		assert_eq!(source.fetch().await.unwrap(), vec![Participant::new("B", 2)]);
	}
}
