use std::fmt;

use chrono::{DateTime, Local};

/// Severity of a record. Child stdout maps to `Info`, stderr to `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
	Info,
	Error,
}

impl Level {
	pub fn as_str(&self) -> &'static str {
		match self {
			Level::Info => "INFO",
			Level::Error => "ERROR",
		}
	}
}

impl fmt::Display for Level {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		// pad() so that `{:<5}` widths apply
		f.pad(self.as_str())
	}
}

/// A single line on its way to the sinks.
#[derive(Debug, Clone)]
pub struct LogRecord {
	pub level: Level,
	pub text: String,
	pub timestamp: Option<DateTime<Local>>,
}

impl LogRecord {
	pub fn new(level: Level, text: impl Into<String>) -> Self {
		Self {
			level,
			text: text.into(),
			timestamp: None,
		}
	}

	pub fn at(mut self, timestamp: DateTime<Local>) -> Self {
		self.timestamp = Some(timestamp);
		self
	}
}

/// Which prefixes to put in front of every line. Shared by all sinks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatSpec {
	pub include_timestamp: bool,
	pub include_level: bool,
}

impl FormatSpec {
	pub const TIMESTAMP_FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S%.3f";

	/// Build a record for `text`, stamping it only if the format shows time.
	pub fn record(&self, level: Level, text: impl Into<String>) -> LogRecord {
		let record = LogRecord::new(level, text);
		if self.include_timestamp {
			record.at(Local::now())
		} else {
			record
		}
	}

	/// `[<timestamp>] [<LEVEL>] <message>`, with either prefix omitted when disabled.
	pub fn render(&self, record: &LogRecord) -> String {
		let mut out = String::with_capacity(record.text.len() + 34);
		if self.include_timestamp {
			if let Some(ts) = &record.timestamp {
				out.push('[');
				out.push_str(&ts.format(Self::TIMESTAMP_FORMAT).to_string());
				out.push_str("] ");
			}
		}
		if self.include_level {
			out.push_str(&format!("[{:<5}] ", record.level));
		}
		out.push_str(&record.text);
		out
	}
}
