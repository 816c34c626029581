use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Invalid or unusable configuration. Always fatal, raised before anything is spawned.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("invalid service name {0:?}")]
	InvalidService(String),

	#[error("no command to run")]
	EmptyCommand,

	#[error("{sink} sink needs a file path")]
	MissingSinkPath { sink: &'static str },

	#[error("cannot create log directory {}: {source}", path.display())]
	CreateLogDir {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("cannot read config file {}: {source}", path.display())]
	ReadFile {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("invalid config file {}: {message}", path.display())]
	ParseFile { path: PathBuf, message: String },
}

/// The child command could not be launched.
#[derive(Debug, Error)]
#[error("failed to launch '{command}': {source}")]
pub struct SpawnError {
	pub command: String,
	#[source]
	pub source: io::Error,
}

impl SpawnError {
	/// The launch failed because the program does not exist.
	pub fn is_not_found(&self) -> bool {
		self.source.kind() == io::ErrorKind::NotFound
	}

	/// Exit status used when the wrapper itself gives up: 127 for a missing
	/// program, 126 for anything that exists but cannot be executed.
	pub fn exit_status(&self) -> i32 {
		if self.is_not_found() {
			127
		} else {
			126
		}
	}
}

#[derive(Debug, Error)]
pub enum SupervisorError {
	#[error(transparent)]
	Spawn(#[from] SpawnError),

	#[error("supervisor has already run its process")]
	AlreadyStarted,

	#[error("waiting for child process failed: {0}")]
	Wait(#[source] io::Error),
}

/// One sink failed to persist one record. Reported, never propagated.
#[derive(Debug, Error)]
#[error("sink '{sink}' write failed: {source}")]
pub struct SinkWriteError {
	pub sink: String,
	#[source]
	pub source: io::Error,
}
