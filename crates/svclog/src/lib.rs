//! # svclog
//!
//! Run a single service process and fan its output out to log sinks.
//!
//! Each line the child writes to stdout is logged at [`Level::Info`], each line
//! it writes to stderr at [`Level::Error`]. Every line goes to every configured
//! sink: a size-bounded rotating file, an optional plain append-only file and
//! an optional console stream.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use svclog::{CommandSpec, FormatSpec, LogRouter, SinkConfig, Supervisor};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let sinks = vec![
//!     SinkConfig::rotating("/tmp/encoder/logs/encoder.log", 2 * 1024 * 1024, 5),
//!     SinkConfig::console(),
//! ];
//! let format = FormatSpec { include_timestamp: true, include_level: true };
//! let router = Arc::new(LogRouter::from_configs(&sinks, format).unwrap());
//!
//! let sup = Supervisor::new(Arc::clone(&router));
//! let command = CommandSpec::new("/viacast/encoder/sbin/encoder.sh", Vec::<String>::new());
//! let code = sup.run(&command).await.unwrap();
//! router.flush().await;
//! std::process::exit(code);
//! # }
//! ```

pub mod error;
pub mod lines;
pub mod paths;
pub mod record;
pub mod router;
pub mod sink;
pub mod supervisor;

pub use error::{ConfigError, SinkWriteError, SpawnError, SupervisorError};
pub use lines::LineSplitter;
pub use record::{FormatSpec, Level, LogRecord};
pub use router::LogRouter;
pub use sink::{Sink, SinkConfig, SinkKind};
pub use supervisor::{CommandSpec, ProcessState, Supervisor, SupervisorOptions};
