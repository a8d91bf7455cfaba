//! stakegate binary.
//!
//! Loads configuration, fetches the participant registry once (exiting
//! non-zero if that fails), then serves until interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use stakegate_registry::Stake;
use stakegate_server::ServerConfig;
use tracing::info;

/// Command line arguments. Flags override the config file and environment.
#[derive(Parser, Debug)]
#[command(name = "stakegate")]
#[command(about = "Stake-gated report ingestion service")]
struct Args {
	/// TOML configuration file
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Listen address
	#[arg(long, value_name = "ADDR")]
	listen: Option<SocketAddr>,

	/// Registry endpoint returning the participant listing
	#[arg(long, value_name = "URL", conflicts_with = "registry_file")]
	registry_url: Option<String>,

	/// Local JSON file with the participant listing
	#[arg(long, value_name = "PATH")]
	registry_file: Option<PathBuf>,

	/// Minimum stake required for authenticated writes
	#[arg(long, value_name = "AMOUNT")]
	min_stake: Option<Stake>,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

impl Args {
	fn into_config(self) -> anyhow::Result<ServerConfig> {
		let mut config = match &self.config {
			Some(path) => ServerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
			None => ServerConfig::default(),
		};
		config.apply_env().context("applying STAKEGATE_* environment")?;

		if let Some(listen) = self.listen {
			config.listen = listen;
		}
		if let Some(url) = self.registry_url {
			config.registry.url = Some(url);
			config.registry.file = None;
		}
		if let Some(file) = self.registry_file {
			config.registry.file = Some(file);
			config.registry.url = None;
		}
		if let Some(min_stake) = self.min_stake {
			config.min_stake = min_stake;
		}
		Ok(config)
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	setup_tracing(args.verbose);

	let config = args.into_config()?;
	info!(listen = %config.listen, min_stake = %config.min_stake, "starting stakegate");

	let running = stakegate_server::start(&config).await.context("startup failed")?;

	tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
	info!("shutdown requested");
	running.shutdown().await;
	Ok(())
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("stakegate=debug,stakegate_server=debug,stakegate_auth=debug,stakegate_registry=debug,info")
		} else {
			EnvFilter::new("info")
		}
	});

	tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
