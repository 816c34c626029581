//! Write targets for rendered log lines.
//!
//! Every sink serializes its own writes behind its own lock, so two streams
//! emitting at once never interleave partial lines, and a slow or broken sink
//! only holds up callers that are writing to it.

mod console;
mod plain;
mod rotating;

pub use console::Console;
pub use plain::PlainFile;
pub use rotating::RotatingFile;

use std::path::PathBuf;

use tracing::trace;

use crate::error::{ConfigError, SinkWriteError};
use crate::record::LogRecord;

pub const DEFAULT_MAX_BYTES: u64 = 2 * 1024 * 1024;
pub const DEFAULT_MAX_BACKUPS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
	RotatingFile,
	PlainFile,
	Console,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
	pub kind: SinkKind,
	pub path: Option<PathBuf>,
	pub max_bytes: Option<u64>,
	pub max_backups: Option<u32>,
}

impl SinkConfig {
	pub fn rotating(path: impl Into<PathBuf>, max_bytes: u64, max_backups: u32) -> Self {
		Self {
			kind: SinkKind::RotatingFile,
			path: Some(path.into()),
			max_bytes: Some(max_bytes),
			max_backups: Some(max_backups),
		}
	}

	pub fn plain(path: impl Into<PathBuf>) -> Self {
		Self {
			kind: SinkKind::PlainFile,
			path: Some(path.into()),
			max_bytes: None,
			max_backups: None,
		}
	}

	pub fn console() -> Self {
		Self {
			kind: SinkKind::Console,
			path: None,
			max_bytes: None,
			max_backups: None,
		}
	}
}

pub enum Sink {
	Rotating(RotatingFile),
	Plain(PlainFile),
	Console(Console),
}

impl Sink {
	pub fn from_config(cfg: &SinkConfig) -> Result<Self, ConfigError> {
		let sink = match cfg.kind {
			SinkKind::RotatingFile => Sink::Rotating(RotatingFile::new(
				required_path(cfg, "rotating")?,
				cfg.max_bytes.unwrap_or(DEFAULT_MAX_BYTES),
				cfg.max_backups.unwrap_or(DEFAULT_MAX_BACKUPS),
			)),
			SinkKind::PlainFile => Sink::Plain(PlainFile::new(required_path(cfg, "file")?)),
			SinkKind::Console => Sink::Console(Console::stdout()),
		};
		Ok(sink)
	}

	pub fn name(&self) -> &'static str {
		match self {
			Sink::Rotating(_) => "rotating",
			Sink::Plain(_) => "file",
			Sink::Console(_) => "console",
		}
	}

	/// True for sinks backed by a file on disk.
	pub fn is_file(&self) -> bool {
		!matches!(self, Sink::Console(_))
	}

	/// Persist one already-rendered line. `text` carries no trailing newline.
	pub async fn write(&self, record: &LogRecord, text: &str) -> Result<(), SinkWriteError> {
		trace!(sink = self.name(), level = %record.level, len = text.len(), "sink write");
		let result = match self {
			Sink::Rotating(s) => s.write_line(text).await,
			Sink::Plain(s) => s.write_line(text).await,
			Sink::Console(s) => s.write_line(text).await,
		};
		result.map_err(|source| SinkWriteError {
			sink: self.name().to_string(),
			source,
		})
	}

	pub async fn flush(&self) -> Result<(), SinkWriteError> {
		let result = match self {
			Sink::Rotating(s) => s.flush().await,
			Sink::Plain(s) => s.flush().await,
			Sink::Console(s) => s.flush().await,
		};
		result.map_err(|source| SinkWriteError {
			sink: self.name().to_string(),
			source,
		})
	}
}

fn required_path(cfg: &SinkConfig, sink: &'static str) -> Result<PathBuf, ConfigError> {
	cfg.path.clone().ok_or(ConfigError::MissingSinkPath { sink })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn file_sinks_need_a_path() {
		let mut cfg = SinkConfig::plain("/tmp/x.log");
		cfg.path = None;
		assert!(matches!(
			Sink::from_config(&cfg),
			Err(ConfigError::MissingSinkPath { sink: "file" })
		));

		let mut cfg = SinkConfig::rotating("/tmp/x.log", 10, 1);
		cfg.path = None;
		assert!(matches!(
			Sink::from_config(&cfg),
			Err(ConfigError::MissingSinkPath { sink: "rotating" })
		));
	}

	#[test]
	fn kinds_map_to_sinks() {
		let sink = Sink::from_config(&SinkConfig::console()).unwrap();
		assert_eq!(sink.name(), "console");
		let sink = Sink::from_config(&SinkConfig::rotating("/tmp/y.log", 10, 1)).unwrap();
		assert_eq!(sink.name(), "rotating");
		let sink = Sink::from_config(&SinkConfig::plain("/tmp/y.log")).unwrap();
		assert_eq!(sink.name(), "file");
	}
}
