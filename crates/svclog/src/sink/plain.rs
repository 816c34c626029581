use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

/// Append-only log file. Never rotated, never truncated.
pub struct PlainFile {
	path: PathBuf,
	file: Mutex<Option<File>>,
}

impl PlainFile {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self {
			path: path.into(),
			file: Mutex::new(None),
		}
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub async fn write_line(&self, text: &str) -> io::Result<()> {
		let mut guard = self.file.lock().await;
		if guard.is_none() {
			*guard = Some(
				OpenOptions::new()
					.create(true)
					.append(true)
					.open(&self.path)?,
			);
		}

		let mut line = Vec::with_capacity(text.len() + 1);
		line.extend_from_slice(text.as_bytes());
		line.push(b'\n');

		let result = match guard.as_mut() {
			Some(file) => file.write_all(&line),
			None => Ok(()),
		};
		if result.is_err() {
			*guard = None;
		}
		result
	}

	pub async fn flush(&self) -> io::Result<()> {
		match self.file.lock().await.as_mut() {
			Some(file) => file.flush(),
			None => Ok(()),
		}
	}
}
