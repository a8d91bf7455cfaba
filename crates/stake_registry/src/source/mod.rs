//! Upstream registry sources.
//!
//! A source returns the complete current participant listing in index order.
//! Failures are reported as [`FetchError`], never as an empty listing.

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Identity, Participant, Stake};

mod file;
mod fixed;
mod http;

pub use file::FileSource;
pub use fixed::FixedSource;
pub use http::HttpSource;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
	#[error("transport error: {0}")]
	Transport(String),

	#[error("upstream returned status {status}: {body}")]
	Status { status: u16, body: String },

	#[error("invalid registry document: {0}")]
	Decode(String),

	#[error("I/O error reading {path}: {error}")]
	Io { path: String, error: String },
}

/// Authoritative source of the participant registry.
#[async_trait]
pub trait RegistrySource: Send + Sync + 'static {
	/// Short human-readable description for logs, such as a URL or path.
	fn describe(&self) -> String;

	/// Fetches the full listing. Must be safe to call repeatedly.
	async fn fetch(&self) -> Result<Vec<Participant>, FetchError>;
}

/// Wire format accepted by the HTTP and file sources.
///
/// Either an explicit participant list, or the metagraph layout with two
/// parallel arrays where position is the index.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum RegistryDocument {
	Participants { participants: Vec<Participant> },
	Metagraph { hotkeys: Vec<Identity>, total_stake: Vec<Stake> },
}

impl RegistryDocument {
	pub(crate) fn parse(bytes: &[u8]) -> Result<Vec<Participant>, FetchError> {
		let doc: Self = serde_json::from_slice(bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
		doc.into_participants()
	}

	fn into_participants(self) -> Result<Vec<Participant>, FetchError> {
		match self {
			Self::Participants { participants } => Ok(participants),
			Self::Metagraph { hotkeys, total_stake } => {
				if hotkeys.len() != total_stake.len() {
					return Err(FetchError::Decode(format!(
						"hotkeys ({}) and total_stake ({}) differ in length",
						hotkeys.len(),
						total_stake.len()
					)));
				}
				Ok(hotkeys
					.into_iter()
					.zip(total_stake)
					.map(|(identity, stake)| Participant { identity, stake })
					.collect())
			}
		}
	}
}
