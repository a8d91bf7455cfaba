use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stakegate_worker::TaskClass;

use super::{FetchError, RegistryDocument, RegistrySource};
use crate::Participant;

/// Reads the registry document from a local JSON file on every fetch.
#[derive(Debug, Clone)]
pub struct FileSource {
	path: PathBuf,
}

impl FileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

#[async_trait]
impl RegistrySource for FileSource {
	fn describe(&self) -> String {
		self.path.display().to_string()
	}

	async fn fetch(&self) -> Result<Vec<Participant>, FetchError> {
		let path = self.path.clone();
		let bytes = stakegate_worker::spawn_blocking(TaskClass::IoBlocking, move || std::fs::read(&path))
			.await
			.map_err(|e| FetchError::Io {
				path: self.describe(),
				error: format!("read task failed: {e}"),
			})?
			.map_err(|e| FetchError::Io {
				path: self.describe(),
				error: e.to_string(),
			})?;
		RegistryDocument::parse(&bytes)
	}
}
