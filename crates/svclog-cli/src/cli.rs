use std::path::PathBuf;

use clap::Parser;

/// Run a service and write its stdout/stderr to rotating log files.
#[derive(Debug, Parser)]
#[command(name = "svclog", version)]
pub struct Args {
	/// Service name
	#[arg(short, long)]
	pub service: String,

	/// Directory where logs are written. Defaults to "<base-dir>/<service>/logs"; created if missing
	#[arg(short, long)]
	pub path: Option<PathBuf>,

	/// Max log file size in bytes before rotating. Defaults to 2 MiB, also when 0
	#[arg(short = 'm', long)]
	pub max_file_size: Option<u64>,

	/// Max number of rotated files, named "<path>/<service>.log.<n>". Defaults to 5; 0 keeps no backups
	#[arg(short = 'n', long)]
	pub max_file_count: Option<u32>,

	/// Add a timestamp to log messages
	#[arg(short = 'd', long)]
	pub show_timestamp: bool,

	/// Add [INFO] to stdout messages and [ERROR] to stderr messages
	#[arg(short = 'l', long)]
	pub show_log_level: bool,

	/// Do not write logs to stdout
	#[arg(short = 'c', long)]
	pub no_console: bool,

	/// Also write logs to "<tmp>/<service>.log"
	#[arg(short = 't', long)]
	pub write_tmp: bool,

	/// Root of the service tree. Defaults to /viacast
	#[arg(long, value_name = "DIR")]
	pub base_dir: Option<PathBuf>,

	/// TOML file with default settings
	#[arg(long, value_name = "FILE")]
	pub config: Option<PathBuf>,

	/// Terminate the service after this many seconds
	#[arg(long, value_name = "SECS")]
	pub timeout: Option<u64>,

	/// Command to run instead of "<base-dir>/<service>/sbin/<service>.sh"
	#[arg(last = true, value_name = "COMMAND")]
	pub command: Vec<String>,
}
