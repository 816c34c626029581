use std::io::{self, Write};

use tokio::sync::Mutex;

/// Line-at-a-time writer to stdout (or any injected writer).
///
/// Both INFO and ERROR lines land here; stdout is the operator-facing channel.
pub struct Console {
	out: Mutex<Box<dyn Write + Send>>,
}

impl Console {
	pub fn stdout() -> Self {
		Self::with_writer(Box::new(io::stdout()))
	}

	pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
		Self {
			out: Mutex::new(out),
		}
	}

	pub async fn write_line(&self, text: &str) -> io::Result<()> {
		let mut out = self.out.lock().await;
		out.write_all(text.as_bytes())?;
		out.write_all(b"\n")?;
		out.flush()
	}

	pub async fn flush(&self) -> io::Result<()> {
		self.out.lock().await.flush()
	}
}
