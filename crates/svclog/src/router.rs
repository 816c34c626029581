use tracing::warn;

use crate::error::ConfigError;
use crate::record::{FormatSpec, Level};
use crate::sink::{Sink, SinkConfig};

/// Renders each message once and hands the same text to every sink.
///
/// A failing sink is reported on the diagnostic channel (`tracing`) and
/// skipped; the remaining sinks still receive the record.
pub struct LogRouter {
	sinks: Vec<Sink>,
	format: FormatSpec,
}

impl LogRouter {
	pub fn new(sinks: Vec<Sink>, format: FormatSpec) -> Self {
		Self { sinks, format }
	}

	pub fn from_configs(configs: &[SinkConfig], format: FormatSpec) -> Result<Self, ConfigError> {
		let sinks = configs
			.iter()
			.map(Sink::from_config)
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self::new(sinks, format))
	}

	pub fn format(&self) -> FormatSpec {
		self.format
	}

	pub fn sink_names(&self) -> Vec<&'static str> {
		self.sinks.iter().map(Sink::name).collect()
	}

	/// Send `message` at `level` to all sinks. Returns how many accepted it.
	pub async fn emit(&self, level: Level, message: &str) -> usize {
		self.deliver(level, message, |_| true).await
	}

	/// Like [`emit`](Self::emit), but skips file sinks. Used for failures that
	/// happen before anything should be written to disk.
	pub async fn emit_console(&self, level: Level, message: &str) -> usize {
		self.deliver(level, message, |sink| !sink.is_file()).await
	}

	async fn deliver(&self, level: Level, message: &str, wanted: impl Fn(&Sink) -> bool) -> usize {
		let record = self.format.record(level, message);
		let text = self.format.render(&record);

		let mut delivered = 0;
		for sink in self.sinks.iter().filter(|s| wanted(s)) {
			match sink.write(&record, &text).await {
				Ok(()) => delivered += 1,
				Err(e) => warn!(sink = sink.name(), error = %e.source, "dropping record for sink"),
			}
		}
		delivered
	}

	pub async fn info(&self, message: &str) -> usize {
		self.emit(Level::Info, message).await
	}

	pub async fn error(&self, message: &str) -> usize {
		self.emit(Level::Error, message).await
	}

	/// Flush every sink. Called once the run is over, before exit.
	pub async fn flush(&self) {
		for sink in &self.sinks {
			if let Err(e) = sink.flush().await {
				warn!(sink = sink.name(), error = %e.source, "flush failed");
			}
		}
	}
}
