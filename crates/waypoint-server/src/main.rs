// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Waypoint analytics server binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use waypoint_server::{create_app_state, create_router};
use waypoint_server_config::{LogFormat, LoggingConfig};

mod version;

/// Waypoint server - event ingestion and funnel analytics.
#[derive(Parser, Debug)]
#[command(name = "waypoint-server", about = "Waypoint analytics server", version)]
struct Args {
	/// Config file to use instead of /etc/waypoint/server.toml
	#[arg(long, env = "WAYPOINT_SERVER_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version and build information
	Version,
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| logging.level.clone().into());

	let fmt_layer = match logging.format {
		LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
		LogFormat::Text => tracing_subscriber::fmt::layer().boxed(),
	};

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt_layer)
		.init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("{}", version::format_version_info());
		return Ok(());
	}

	dotenvy::dotenv().ok();

	let config = match &args.config {
		Some(path) => waypoint_server_config::load_config_with_file(path)?,
		None => waypoint_server_config::load_config()?,
	};

	init_tracing(&config.logging);

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		database = %config.database.url,
		"starting waypoint-server"
	);

	let state = create_app_state(&config).await?;
	let app = create_router(state);

	let addr = config.socket_addr();
	tracing::info!("listening on {}", addr);

	let listener = tokio::net::TcpListener::bind(&addr).await?;

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "server error");
			}
		}
		_ = tokio::signal::ctrl_c() => {
			tracing::info!("received shutdown signal");
		}
	}

	tracing::info!("server shutdown complete");
	Ok(())
}
