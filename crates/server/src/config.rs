//! Server configuration.
//!
//! Layering, lowest to highest precedence: built-in defaults, TOML file,
//! `STAKEGATE_*` environment variables, command-line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stakegate_registry::source::{FileSource, HttpSource};
use stakegate_registry::{RefreshConfig, RegistrySource, Stake};
use thiserror::Error;

const ENV_LISTEN: &str = "STAKEGATE_LISTEN";
const ENV_MIN_STAKE: &str = "STAKEGATE_MIN_STAKE";
const ENV_REGISTRY_URL: &str = "STAKEGATE_REGISTRY_URL";
const ENV_REGISTRY_FILE: &str = "STAKEGATE_REGISTRY_FILE";
const ENV_REFRESH_INTERVAL: &str = "STAKEGATE_REFRESH_INTERVAL_SECS";
const ENV_REFRESH_TIMEOUT: &str = "STAKEGATE_REFRESH_TIMEOUT_SECS";

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	#[error("invalid configuration: {0}")]
	Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
	pub listen: SocketAddr,
	/// Admission threshold for authenticated writes. Must be positive.
	pub min_stake: Stake,
	pub registry: RegistrySection,
	pub refresh: RefreshSection,
}

/// Where the registry comes from. Exactly one of `url` and `file` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySection {
	pub url: Option<String>,
	pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RefreshSection {
	pub interval_secs: u64,
	pub timeout_secs: u64,
}

impl Default for ServerConfig {
	fn default() -> Self {
		Self {
			listen: SocketAddr::from(([0, 0, 0, 0], 10931)),
			min_stake: stakegate_auth::DEFAULT_MIN_STAKE,
			registry: RegistrySection::default(),
			refresh: RefreshSection::default(),
		}
	}
}

impl Default for RefreshSection {
	fn default() -> Self {
		let defaults = RefreshConfig::default();
		Self {
			interval_secs: defaults.interval.as_secs(),
			timeout_secs: defaults.timeout.as_secs(),
		}
	}
}

impl ServerConfig {
	pub fn from_toml_str(input: &str) -> Result<Self> {
		Ok(toml::from_str(input)?)
	}

	pub fn load(path: &Path) -> Result<Self> {
		let input = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&input)
	}

	/// Applies `STAKEGATE_*` overrides from the process environment.
	pub fn apply_env(&mut self) -> Result<()> {
		self.apply_env_with(|key| std::env::var(key).ok())
	}

	/// Applies `STAKEGATE_*` overrides read through `lookup`.
	///
	/// A registry URL or file from the environment replaces both registry
	/// keys from the file. Setting both variables is an error.
	pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
		if let Some(value) = lookup(ENV_LISTEN) {
			self.listen = parse_env(ENV_LISTEN, &value)?;
		}
		if let Some(value) = lookup(ENV_MIN_STAKE) {
			self.min_stake = parse_env(ENV_MIN_STAKE, &value)?;
		}
		match (lookup(ENV_REGISTRY_URL), lookup(ENV_REGISTRY_FILE)) {
			(Some(_), Some(_)) => {
				return Err(ConfigError::Invalid(format!("{ENV_REGISTRY_URL} and {ENV_REGISTRY_FILE} are mutually exclusive")));
			}
			(Some(url), None) => {
				self.registry = RegistrySection { url: Some(url), file: None };
			}
			(None, Some(file)) => {
				self.registry = RegistrySection {
					url: None,
					file: Some(PathBuf::from(file)),
				};
			}
			(None, None) => {}
		}
		if let Some(value) = lookup(ENV_REFRESH_INTERVAL) {
			self.refresh.interval_secs = parse_env(ENV_REFRESH_INTERVAL, &value)?;
		}
		if let Some(value) = lookup(ENV_REFRESH_TIMEOUT) {
			self.refresh.timeout_secs = parse_env(ENV_REFRESH_TIMEOUT, &value)?;
		}
		Ok(())
	}

	/// Checks the registry source and then [`Self::validate_limits`].
	pub fn validate(&self) -> Result<()> {
		match (&self.registry.url, &self.registry.file) {
			(Some(_), Some(_)) => return Err(ConfigError::Invalid("registry.url and registry.file are mutually exclusive".into())),
			(None, None) => return Err(ConfigError::Invalid("one of registry.url or registry.file is required".into())),
			(Some(url), None) if url.trim().is_empty() => return Err(ConfigError::Invalid("registry.url is empty".into())),
			_ => {}
		}
		self.validate_limits()
	}

	/// Checks the settings that do not depend on where the registry comes from.
	///
	/// A zero threshold would admit every registered identity regardless of
	/// stake, so it is rejected along with zero refresh timings.
	pub fn validate_limits(&self) -> Result<()> {
		if self.min_stake == Stake::ZERO {
			return Err(ConfigError::Invalid("min_stake must be positive".into()));
		}
		if self.refresh.interval_secs == 0 {
			return Err(ConfigError::Invalid("refresh.interval_secs must be positive".into()));
		}
		if self.refresh.timeout_secs == 0 {
			return Err(ConfigError::Invalid("refresh.timeout_secs must be positive".into()));
		}
		Ok(())
	}

	pub fn refresh_config(&self) -> RefreshConfig {
		RefreshConfig {
			interval: Duration::from_secs(self.refresh.interval_secs),
			timeout: Duration::from_secs(self.refresh.timeout_secs),
		}
	}

	/// Builds the configured registry source. Call [`Self::validate`] first.
	pub fn registry_source(&self) -> Result<Arc<dyn RegistrySource>> {
		match (&self.registry.url, &self.registry.file) {
			(Some(url), None) => {
				let source = HttpSource::new(url.as_str()).map_err(|e| ConfigError::Invalid(format!("registry.url: {e}")))?;
				Ok(Arc::new(source))
			}
			(None, Some(path)) => Ok(Arc::new(FileSource::new(path))),
			_ => Err(ConfigError::Invalid("exactly one of registry.url or registry.file is required".into())),
		}
	}
}

fn parse_env<T>(key: &str, value: &str) -> Result<T>
where
	T: std::str::FromStr,
	T::Err: std::fmt::Display,
{
	value.trim().parse().map_err(|e| ConfigError::Invalid(format!("{key}={value:?}: {e}")))
}
