//! Process wiring: registry bootstrap, background refresh and HTTP serving.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use stakegate_auth::Authenticator;
use stakegate_registry::{RefreshConfigError, RefreshError, RefresherHandle, RegistryRefresher, RegistrySource, RegistryStore};
use stakegate_worker::ShutdownMode;
use thiserror::Error;

use crate::config::{ConfigError, ServerConfig};
use crate::http::{HttpError, HttpServer};
use crate::reports::ReportStore;

const REFRESHER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state behind every request handler.
pub struct AppState {
	pub authenticator: Authenticator,
	pub reports: ReportStore,
	/// Used for refresh status only. The running task is owned by [`Running`].
	pub refresher: RegistryRefresher,
}

impl AppState {
	pub fn new(authenticator: Authenticator, refresher: RegistryRefresher) -> Self {
		Self {
			authenticator,
			reports: ReportStore::new(),
			refresher,
		}
	}
}

#[derive(Debug, Error)]
pub enum StartupError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error("initial registry fetch failed: {0}")]
	Bootstrap(#[from] RefreshError),

	#[error("cannot start registry refresh: {0}")]
	Refresh(#[from] RefreshConfigError),

	#[error(transparent)]
	Http(#[from] HttpError),
}

/// A started service.
pub struct Running {
	state: Arc<AppState>,
	http: HttpServer,
	refresher: RefresherHandle,
}

impl Running {
	pub fn local_addr(&self) -> SocketAddr {
		self.http.local_addr()
	}

	pub fn state(&self) -> &Arc<AppState> {
		&self.state
	}

	/// Stops the listener first, then the refresher.
	pub async fn shutdown(self) {
		self.http.shutdown().await;
		let report = self
			.refresher
			.shutdown(ShutdownMode::Graceful {
				timeout: REFRESHER_SHUTDOWN_TIMEOUT,
			})
			.await;
		tracing::info!(completed = report.completed(), "server.stopped");
	}
}

/// Validates `config`, builds its registry source and starts the service.
pub async fn start(config: &ServerConfig) -> Result<Running, StartupError> {
	config.validate()?;
	let source = config.registry_source()?;
	start_with_source(config, source).await
}

/// Starts the service against an explicit registry source.
///
/// The first registry fetch must succeed before the listener is bound, so the
/// service never accepts a request it cannot authenticate. The registry
/// section of `config` is ignored, but its limits are still validated.
pub async fn start_with_source(config: &ServerConfig, source: Arc<dyn RegistrySource>) -> Result<Running, StartupError> {
	config.validate_limits()?;
	let store = Arc::new(RegistryStore::new());
	let refresher = RegistryRefresher::new(source, Arc::clone(&store), config.refresh_config());

	let outcome = refresher.bootstrap().await?;
	tracing::info!(generation = outcome.generation, participants = outcome.participants, "server.registry_ready");
	let handle = refresher.spawn()?;

	let state = Arc::new(AppState::new(Authenticator::new(store, config.min_stake), refresher));
	let http = match HttpServer::bind(config.listen, Arc::clone(&state)) {
		Ok(http) => http,
		Err(err) => {
			handle.shutdown(ShutdownMode::Immediate).await;
			return Err(err.into());
		}
	};
	tracing::info!(addr = %http.local_addr(), min_stake = %config.min_stake, "server.listening");

	Ok(Running {
		state,
		http,
		refresher: handle,
	})
}
