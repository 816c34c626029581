mod cli;
mod config;

use std::fmt::Display;
use std::sync::Arc;

use clap::Parser;
use owo_colors::OwoColorize;
use svclog::{LogRouter, Supervisor, SupervisorError, SupervisorOptions};
use tracing_subscriber::EnvFilter;

use cli::Args;
use config::{Config, FileConfig};

/// sysexits EX_SOFTWARE: the wrapper itself failed after the child started.
const EXIT_SOFTWARE: i32 = 70;
/// sysexits EX_CONFIG
const EXIT_CONFIG: i32 = 78;

#[tokio::main]
async fn main() {
	let args = Args::parse();
	init_tracing();

	let code = run(&args).await;
	std::process::exit(code);
}

async fn run(args: &Args) -> i32 {
	let config = match load_config(args) {
		Ok(config) => config,
		Err(e) => {
			report(&e);
			return EXIT_CONFIG;
		}
	};
	tracing::debug!(?config, "configuration resolved");

	let router = match LogRouter::from_configs(&config.sinks(), config.format) {
		Ok(router) => Arc::new(router),
		Err(e) => {
			report(&e);
			return EXIT_CONFIG;
		}
	};

	let supervisor = Supervisor::with_options(
		Arc::clone(&router),
		SupervisorOptions {
			timeout: config.timeout,
			forward_signals: true,
			announce: config.announcements(),
		},
	);

	let code = match supervisor.run(&config.command).await {
		Ok(code) => code,
		Err(SupervisorError::Spawn(e)) => {
			report(&e);
			e.exit_status()
		}
		Err(e) => {
			report(&e);
			EXIT_SOFTWARE
		}
	};

	router.flush().await;
	code
}

fn load_config(args: &Args) -> Result<Config, svclog::ConfigError> {
	let file = match &args.config {
		Some(path) => FileConfig::load(path)?,
		None => FileConfig::default(),
	};
	let config = Config::resolve(args, file)?;
	config.prepare_log_dir()?;
	Ok(config)
}

fn init_tracing() {
	let filter = EnvFilter::try_from_env("SVCLOG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
	// stdout belongs to the console sink
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.init();
}

fn report(err: &dyn Display) {
	eprintln!("{} {}", "svclog:".red().bold(), err);
}
