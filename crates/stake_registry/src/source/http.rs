use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;

use super::{FetchError, RegistryDocument, RegistrySource};
use crate::Participant;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY: usize = 512;

/// Fetches the registry document with `GET <url>`.
#[derive(Debug, Clone)]
pub struct HttpSource {
	client: Client,
	url: String,
}

impl HttpSource {
	pub fn new(url: impl Into<String>) -> Result<Self, FetchError> {
		let client = Client::builder()
			.connect_timeout(CONNECT_TIMEOUT)
			.build()
			.map_err(|e| FetchError::Transport(e.to_string()))?;
		Ok(Self { client, url: url.into() })
	}
}

#[async_trait]
impl RegistrySource for HttpSource {
	fn describe(&self) -> String {
		self.url.clone()
	}

	async fn fetch(&self) -> Result<Vec<Participant>, FetchError> {
		let response = self
			.client
			.get(&self.url)
			.header(ACCEPT, "application/json")
			.send()
			.await
			.map_err(|e| FetchError::Transport(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let mut body = response.text().await.unwrap_or_default();
			body.truncate(floor_char_boundary(&body, MAX_ERROR_BODY));
			return Err(FetchError::Status {
				status: status.as_u16(),
				body,
			});
		}

		let bytes = response.bytes().await.map_err(|e| FetchError::Transport(e.to_string()))?;
		RegistryDocument::parse(&bytes)
	}
}

fn floor_char_boundary(s: &str, max: usize) -> usize {
	if s.len() <= max {
		return s.len();
	}
	(0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
