use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use svclog::sink::{DEFAULT_MAX_BACKUPS, DEFAULT_MAX_BYTES};
use svclog::{paths, CommandSpec, ConfigError, FormatSpec, SinkConfig};

use crate::cli::Args;

pub const DEFAULT_BASE_DIR: &str = "/viacast";

// ── Optional TOML file ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
	pub base_dir: Option<PathBuf>,
	pub path: Option<PathBuf>,
	pub max_file_size: Option<u64>,
	pub max_file_count: Option<u32>,
	pub show_timestamp: Option<bool>,
	pub show_log_level: Option<bool>,
	pub console: Option<bool>,
	pub write_tmp: Option<bool>,
	pub tmp_dir: Option<PathBuf>,
	pub timeout_secs: Option<u64>,
	pub command: Option<Vec<String>>,
}

impl FileConfig {
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
			path: path.to_path_buf(),
			source,
		})?;
		Self::parse(path, &content)
	}

	fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
		toml::from_str(content).map_err(|e| ConfigError::ParseFile {
			path: path.to_path_buf(),
			message: e.to_string(),
		})
	}
}

// ── Resolved configuration ──────────────────────────────────────────────────

/// Everything the run needs, fixed before anything is spawned.
#[derive(Debug, Clone)]
pub struct Config {
	pub service: String,
	pub log_dir: PathBuf,
	pub max_file_size: u64,
	pub max_file_count: u32,
	pub format: FormatSpec,
	pub console: bool,
	pub tmp_file: Option<PathBuf>,
	pub command: CommandSpec,
	pub timeout: Option<Duration>,
}

impl Config {
	/// Command line wins over the file, the file wins over built-in defaults.
	pub fn resolve(args: &Args, file: FileConfig) -> Result<Self, ConfigError> {
		let service = args.service.trim().to_string();
		validate_service(&service)?;

		let base_dir = args
			.base_dir
			.clone()
			.or(file.base_dir)
			.unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR));

		let log_dir = args
			.path
			.clone()
			.or(file.path)
			.unwrap_or_else(|| default_log_dir(&base_dir, &service));

		let argv = if !args.command.is_empty() {
			args.command.clone()
		} else if let Some(command) = file.command {
			command
		} else {
			vec![default_command(&base_dir, &service).to_string_lossy().into_owned()]
		};
		let command = CommandSpec::from_argv(&argv).ok_or(ConfigError::EmptyCommand)?;
		if command.program.as_os_str().is_empty() {
			return Err(ConfigError::EmptyCommand);
		}

		let write_tmp = args.write_tmp || file.write_tmp.unwrap_or(false);
		let tmp_file = write_tmp.then(|| {
			let tmp_dir = file.tmp_dir.clone().unwrap_or_else(std::env::temp_dir);
			paths::tmp_log_path(&tmp_dir, &service)
		});

		Ok(Self {
			// 0 means "not set", as with the original -m flag
			max_file_size: args
				.max_file_size
				.or(file.max_file_size)
				.filter(|&size| size > 0)
				.unwrap_or(DEFAULT_MAX_BYTES),
			max_file_count: args.max_file_count.or(file.max_file_count).unwrap_or(DEFAULT_MAX_BACKUPS),
			format: FormatSpec {
				include_timestamp: args.show_timestamp || file.show_timestamp.unwrap_or(false),
				include_level: args.show_log_level || file.show_log_level.unwrap_or(false),
			},
			console: !args.no_console && file.console.unwrap_or(true),
			timeout: args.timeout.or(file.timeout_secs).map(Duration::from_secs),
			service,
			log_dir,
			tmp_file,
			command,
		})
	}

	pub fn log_path(&self) -> PathBuf {
		paths::active_log_path(&self.log_dir, &self.service)
	}

	/// Rotating file first, then the temp copy, then the console.
	pub fn sinks(&self) -> Vec<SinkConfig> {
		let mut sinks = vec![SinkConfig::rotating(self.log_path(), self.max_file_size, self.max_file_count)];
		if let Some(tmp) = &self.tmp_file {
			sinks.push(SinkConfig::plain(tmp));
		}
		if self.console {
			sinks.push(SinkConfig::console());
		}
		sinks
	}

	pub fn announcements(&self) -> Vec<String> {
		self.tmp_file
			.iter()
			.map(|tmp| format!("Will write to \"{}\"", tmp.display()))
			.collect()
	}

	pub fn prepare_log_dir(&self) -> Result<(), ConfigError> {
		std::fs::create_dir_all(&self.log_dir).map_err(|source| ConfigError::CreateLogDir {
			path: self.log_dir.clone(),
			source,
		})
	}
}

pub fn default_log_dir(base_dir: &Path, service: &str) -> PathBuf {
	base_dir.join(service).join("logs")
}

pub fn default_command(base_dir: &Path, service: &str) -> PathBuf {
	base_dir.join(service).join("sbin").join(format!("{}.sh", service))
}

fn validate_service(service: &str) -> Result<(), ConfigError> {
	if service.is_empty() || service == "." || service == ".." || service.contains(['/', '\\']) {
		return Err(ConfigError::InvalidService(service.to_string()));
	}
	Ok(())
}
