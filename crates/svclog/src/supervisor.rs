use std::fmt;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{SpawnError, SupervisorError};
use crate::lines::LineSplitter;
use crate::record::Level;
use crate::router::LogRouter;

const READ_BUF_SIZE: usize = 4096;
const KILL_GRACE: Duration = Duration::from_secs(3);
const GROUP_POLL: Duration = Duration::from_millis(50);

/// Program and arguments, executed directly (no shell).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
	pub program: PathBuf,
	pub args: Vec<String>,
}

impl CommandSpec {
	pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self {
			program: program.into(),
			args: args.into_iter().map(Into::into).collect(),
		}
	}

	/// First element is the program. `None` for an empty argv.
	pub fn from_argv(argv: &[String]) -> Option<Self> {
		let (program, args) = argv.split_first()?;
		Some(Self::new(program, args.iter().cloned()))
	}
}

impl fmt::Display for CommandSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.program.display())?;
		for arg in &self.args {
			write!(f, " {}", arg)?;
		}
		Ok(())
	}
}

#[derive(Debug, Clone, Default)]
pub struct SupervisorOptions {
	/// Kill the child's process group (SIGTERM, then SIGKILL after a grace
	/// period) if it runs longer.
	pub timeout: Option<Duration>,
	/// Forward SIGTERM, SIGHUP and SIGINT to the child's process group while it runs.
	pub forward_signals: bool,
	/// Extra INFO records emitted once the child is running, before the `Running` line.
	pub announce: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
	NotStarted,
	Running { pid: u32 },
	Terminated { exit_code: i32 },
}

impl ProcessState {
	pub fn is_running(&self) -> bool {
		matches!(self, ProcessState::Running { .. })
	}

	pub fn exit_code(&self) -> Option<i32> {
		match self {
			ProcessState::Terminated { exit_code } => Some(*exit_code),
			_ => None,
		}
	}
}

#[derive(Debug, Clone, Copy)]
enum Stream {
	Stdout,
	Stderr,
}

impl Stream {
	fn name(self) -> &'static str {
		match self {
			Stream::Stdout => "stdout",
			Stream::Stderr => "stderr",
		}
	}

	fn level(self) -> Level {
		match self {
			Stream::Stdout => Level::Info,
			Stream::Stderr => Level::Error,
		}
	}
}

/// Runs one child process to completion, logging everything it prints.
///
/// Single-shot: a second call to [`run`](Self::run) fails with
/// [`SupervisorError::AlreadyStarted`].
pub struct Supervisor {
	router: Arc<LogRouter>,
	options: SupervisorOptions,
	claimed: AtomicBool,
	state: watch::Sender<ProcessState>,
}

impl Supervisor {
	pub fn new(router: Arc<LogRouter>) -> Self {
		Self::with_options(router, SupervisorOptions::default())
	}

	pub fn with_options(router: Arc<LogRouter>, options: SupervisorOptions) -> Self {
		let (state, _) = watch::channel(ProcessState::NotStarted);
		Self {
			router,
			options,
			claimed: AtomicBool::new(false),
			state,
		}
	}

	pub fn state(&self) -> ProcessState {
		*self.state.borrow()
	}

	pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
		self.state.subscribe()
	}

	/// Spawn `command`, drain both output streams into the router until they
	/// close, wait for the exit, log it and return the exit code.
	///
	/// The child leads its own process group and every signal it is sent goes
	/// to the whole group, so helpers started by a wrapper script go with it.
	/// A child killed by signal N yields `128 + N`.
	pub async fn run(&self, command: &CommandSpec) -> Result<i32, SupervisorError> {
		if self.claimed.swap(true, Ordering::SeqCst) {
			return Err(SupervisorError::AlreadyStarted);
		}

		let mut child = match spawn_process(command) {
			Ok(child) => child,
			Err(e) => {
				// console only: a failed launch must not create the log files
				self.router.emit_console(Level::Error, &e.to_string()).await;
				return Err(e.into());
			}
		};
		let pid = child.id().unwrap_or(0);
		self.state.send_replace(ProcessState::Running { pid });
		debug!(pid, command = %command, "child started");

		for notice in &self.options.announce {
			self.router.info(notice).await;
		}
		self.router.info(&format!("Running '{}'...", command)).await;

		let stdout = tokio::spawn(drain(child.stdout.take(), Stream::Stdout, Arc::clone(&self.router)));
		let stderr = tokio::spawn(drain(child.stderr.take(), Stream::Stderr, Arc::clone(&self.router)));
		let signals = self
			.options
			.forward_signals
			.then(|| tokio::spawn(forward_signals(pid)));

		let (status, out_done, err_done) = tokio::join!(self.wait(&mut child, pid), stdout, stderr);

		if let Some(handle) = signals {
			handle.abort();
		}
		for (stream, done) in [(Stream::Stdout, out_done), (Stream::Stderr, err_done)] {
			if let Err(e) = done {
				warn!(stream = stream.name(), error = %e, "drain task did not finish cleanly");
			}
		}

		let status = match status {
			Ok(status) => status,
			Err(e) => return Err(self.wait_failed(e).await),
		};

		let (exit_code, message) = describe_exit(status);
		self.router.info(&message).await;
		self.state.send_replace(ProcessState::Terminated { exit_code });
		debug!(pid, exit_code, "child terminated");

		Ok(exit_code)
	}

	async fn wait(&self, child: &mut Child, pid: u32) -> io::Result<ExitStatus> {
		let Some(limit) = self.options.timeout else {
			return child.wait().await;
		};

		match tokio::time::timeout(limit, child.wait()).await {
			Ok(status) => status,
			Err(_) => {
				self.router
					.error(&format!(
						"Timed out after {}s; terminating process.",
						limit.as_secs_f64()
					))
					.await;
				terminate_group(child, pid).await
			}
		}
	}

	/// The exit status is lost; publish a final state anyway so watchers
	/// never see the run stuck in `Running`.
	async fn wait_failed(&self, e: io::Error) -> SupervisorError {
		self.router.error(&format!("Failed to wait for process: {}", e)).await;
		self.state.send_replace(ProcessState::Terminated { exit_code: -1 });
		SupervisorError::Wait(e)
	}
}

fn spawn_process(command: &CommandSpec) -> Result<Child, SpawnError> {
	let mut cmd = Command::new(&command.program);
	cmd.args(&command.args)
		.stdin(Stdio::null())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.process_group(0);

	cmd.spawn().map_err(|source| SpawnError {
		command: command.to_string(),
		source,
	})
}

/// Read `reader` until EOF, emitting each line at the stream's level.
///
/// A read error is logged and treated as end of stream.
async fn drain<R: AsyncRead + Unpin>(reader: Option<R>, stream: Stream, router: Arc<LogRouter>) {
	let Some(mut reader) = reader else {
		return;
	};
	let mut splitter = LineSplitter::new();
	let mut buf = [0u8; READ_BUF_SIZE];
	let mut lines = 0usize;

	loop {
		match reader.read(&mut buf).await {
			Ok(0) => break,
			Ok(n) => {
				for line in splitter.feed(&buf[..n]) {
					router.emit(stream.level(), &line).await;
					lines += 1;
				}
			}
			Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
			Err(e) => {
				warn!(stream = stream.name(), error = %e, "read failed, treating stream as closed");
				router
					.error(&format!("{} read failed: {}", stream.name(), e))
					.await;
				break;
			}
		}
	}

	if let Some(line) = splitter.flush() {
		router.emit(stream.level(), &line).await;
		lines += 1;
	}
	debug!(stream = stream.name(), lines, "stream closed");
}

/// SIGTERM the child's process group, then SIGKILL whatever is still in it
/// once the grace period is over.
async fn terminate_group(child: &mut Child, pid: u32) -> io::Result<ExitStatus> {
	let group = Pid::from_raw(pid as i32);
	signal_group(group, Signal::SIGTERM);
	let deadline = Instant::now() + KILL_GRACE;

	let status = match tokio::time::timeout_at(deadline, child.wait()).await {
		Ok(status) => status?,
		Err(_) => {
			warn!(pid, "child ignored SIGTERM, sending SIGKILL");
			signal_group(group, Signal::SIGKILL);
			return child.wait().await;
		}
	};

	// the leader is gone but descendants may still hold the output pipes
	while group_alive(group) {
		if Instant::now() >= deadline {
			warn!(pid, "descendants outlived SIGTERM, sending SIGKILL");
			signal_group(group, Signal::SIGKILL);
			break;
		}
		tokio::time::sleep(GROUP_POLL).await;
	}
	Ok(status)
}

fn signal_group(group: Pid, sig: Signal) {
	if let Err(e) = killpg(group, sig) {
		debug!(pgid = group.as_raw(), signal = %sig, error = %e, "signal not delivered");
	}
}

fn group_alive(group: Pid) -> bool {
	killpg(group, None).is_ok()
}

async fn forward_signals(pid: u32) {
	use tokio::signal::unix::{signal, SignalKind};

	let (Ok(mut term), Ok(mut hup), Ok(mut int)) = (
		signal(SignalKind::terminate()),
		signal(SignalKind::hangup()),
		signal(SignalKind::interrupt()),
	) else {
		warn!("cannot install signal handlers, signals will not be forwarded");
		return;
	};

	loop {
		let sig = tokio::select! {
			_ = term.recv() => Signal::SIGTERM,
			_ = hup.recv() => Signal::SIGHUP,
			// the child's group is not the terminal's foreground group
			_ = int.recv() => Signal::SIGINT,
		};
		debug!(pid, signal = %sig, "forwarding signal");
		if let Err(e) = killpg(Pid::from_raw(pid as i32), sig) {
			warn!(pid, signal = %sig, error = %e, "failed to forward signal");
		}
	}
}

fn describe_exit(status: ExitStatus) -> (i32, String) {
	if let Some(code) = status.code() {
		return (code, format!("Process exited with code {}.", code));
	}
	match status.signal() {
		Some(sig) => {
			let name = Signal::try_from(sig)
				.map(|s| s.as_str().to_string())
				.unwrap_or_else(|_| format!("signal {}", sig));
			(128 + sig, format!("Process terminated by signal {}.", name))
		}
		None => (-1, "Process exited with unknown status.".to_string()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::record::FormatSpec;
	use crate::sink::{Console, Sink};
	use std::io::Write;
	use std::pin::Pin;
	use std::sync::Mutex;
	use std::task::{Context, Poll};
	use tokio::io::ReadBuf;

	#[derive(Clone, Default)]
	struct Shared(Arc<Mutex<Vec<u8>>>);

	impl Shared {
		fn lines(&self) -> Vec<String> {
			String::from_utf8_lossy(&self.0.lock().unwrap())
				.lines()
				.map(str::to_string)
				.collect()
		}
	}

	impl Write for Shared {
		fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
			self.0.lock().unwrap().extend_from_slice(buf);
			Ok(buf.len())
		}
		fn flush(&mut self) -> io::Result<()> {
			Ok(())
		}
	}

	fn console_router() -> (Arc<LogRouter>, Shared) {
		let out = Shared::default();
		let router = LogRouter::new(
			vec![Sink::Console(Console::with_writer(Box::new(out.clone())))],
			FormatSpec::default(),
		);
		(Arc::new(router), out)
	}

	/// Hands out scripted reads, then EOF.
	struct Scripted(Vec<io::Result<&'static [u8]>>);

	impl AsyncRead for Scripted {
		fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
			if self.0.is_empty() {
				return Poll::Ready(Ok(()));
			}
			match self.0.remove(0) {
				Ok(bytes) => {
					buf.put_slice(bytes);
					Poll::Ready(Ok(()))
				}
				Err(e) => Poll::Ready(Err(e)),
			}
		}
	}

	#[tokio::test]
	async fn read_error_ends_the_stream_and_keeps_the_tail() {
		let (router, out) = console_router();
		let reader = Scripted(vec![
			Ok(&b"one\ntw"[..]),
			Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke")),
			Ok(&b"never\n"[..]),
		]);

		drain(Some(reader), Stream::Stdout, router).await;

		assert_eq!(out.lines(), vec!["one", "stdout read failed: pipe broke", "tw"]);
	}

	#[tokio::test]
	async fn wait_failure_still_publishes_a_final_state() {
		let (router, out) = console_router();
		let sup = Supervisor::new(router);
		let mut states = sup.subscribe();
		sup.state.send_replace(ProcessState::Running { pid: 42 });

		let err = sup.wait_failed(io::Error::new(io::ErrorKind::Other, "no child")).await;

		assert!(matches!(err, SupervisorError::Wait(_)));
		assert_eq!(*states.borrow_and_update(), ProcessState::Terminated { exit_code: -1 });
		assert!(!sup.state().is_running());
		assert_eq!(out.lines(), vec!["Failed to wait for process: no child"]);
	}

	#[test]
	fn command_display_and_argv() {
		let cmd = CommandSpec::new("/viacast/encoder/sbin/encoder.sh", ["--fast", "x"]);
		assert_eq!(cmd.to_string(), "/viacast/encoder/sbin/encoder.sh --fast x");

		let argv = vec!["sh".to_string(), "-c".to_string(), "exit 3".to_string()];
		let cmd = CommandSpec::from_argv(&argv).unwrap();
		assert_eq!(cmd.program, PathBuf::from("sh"));
		assert_eq!(cmd.args, vec!["-c", "exit 3"]);

		assert!(CommandSpec::from_argv(&[]).is_none());
	}

	#[test]
	fn exit_descriptions() {
		let (code, msg) = describe_exit(ExitStatus::from_raw(3 << 8));
		assert_eq!(code, 3);
		assert_eq!(msg, "Process exited with code 3.");

		let (code, msg) = describe_exit(ExitStatus::from_raw(0));
		assert_eq!(code, 0);
		assert_eq!(msg, "Process exited with code 0.");

		let (code, msg) = describe_exit(ExitStatus::from_raw(15));
		assert_eq!(code, 143);
		assert_eq!(msg, "Process terminated by signal SIGTERM.");
	}

	#[test]
	fn state_helpers() {
		assert!(ProcessState::Running { pid: 7 }.is_running());
		assert!(!ProcessState::NotStarted.is_running());
		assert_eq!(ProcessState::Terminated { exit_code: 2 }.exit_code(), Some(2));
		assert_eq!(ProcessState::Running { pid: 7 }.exit_code(), None);
	}
}
