//! Incremental newline splitting for raw pipe output.

/// Turns arbitrary read chunks into complete lines.
///
/// A trailing partial line is held back until the next [`feed`](Self::feed)
/// completes it, or until [`flush`](Self::flush) at end of stream. Lines are
/// split on raw `\n` bytes before UTF-8 decoding, so a multi-byte character
/// cut in half by a read boundary is reassembled intact.
#[derive(Debug, Default)]
pub struct LineSplitter {
	pending: Vec<u8>,
}

impl LineSplitter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append `chunk` and return every line it completes, without the `\n`.
	pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
		let mut lines = Vec::new();
		let mut rest = chunk;

		while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
			let (head, tail) = rest.split_at(pos);
			if self.pending.is_empty() {
				lines.push(decode(head));
			} else {
				self.pending.extend_from_slice(head);
				lines.push(decode(&self.pending));
				self.pending.clear();
			}
			rest = &tail[1..];
		}

		self.pending.extend_from_slice(rest);
		lines
	}

	/// Take whatever is buffered as a final line. Returns `None` when empty.
	pub fn flush(&mut self) -> Option<String> {
		if self.pending.is_empty() {
			return None;
		}
		let line = decode(&self.pending);
		self.pending.clear();
		Some(line)
	}

	pub fn has_pending(&self) -> bool {
		!self.pending.is_empty()
	}
}

fn decode(bytes: &[u8]) -> String {
	String::from_utf8_lossy(bytes).into_owned()
}
