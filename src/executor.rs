//! Synchronous execution of the external benchmark binary.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{BenchError, Result};
use crate::invocation::Invocation;

/// Lines of standard error kept when a process fails.
const STDERR_TAIL_LINES: usize = 8;
/// How long a stopped process group gets to exit on SIGTERM before SIGKILL.
#[cfg(unix)]
const TERM_GRACE: Duration = Duration::from_millis(500);

/// Shared flag that asks an in-flight invocation to stop.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an untriggered token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Bounds on a single invocation. The default blocks until the process exits.
#[derive(Clone, Debug, Default)]
pub struct ExecLimits {
    /// Kill the process after this long.
    pub timeout: Option<Duration>,
    /// Kill the process once this token is cancelled.
    pub cancel: Option<CancelToken>,
}

impl ExecLimits {
    fn is_bounded(&self) -> bool {
        self.timeout.is_some() || self.cancel.is_some()
    }
}

/// Runs one benchmark invocation and returns its standard output.
pub trait BenchExecutor {
    /// Executes `invocation`, failing on launch errors, non-zero exit,
    /// timeout, cancellation or undecodable output.
    fn execute(&self, invocation: &Invocation, limits: &ExecLimits) -> Result<String>;
}

impl<E: BenchExecutor + ?Sized> BenchExecutor for &E {
    fn execute(&self, invocation: &Invocation, limits: &ExecLimits) -> Result<String> {
        (**self).execute(invocation, limits)
    }
}

/// [`BenchExecutor`] backed by a child process.
#[derive(Clone, Debug)]
pub struct ProcessExecutor {
    poll_interval: Duration,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl ProcessExecutor {
    /// Creates an executor with the default poll interval.
    pub fn new() -> Self {
        Self::default()
    }

    /// How often a bounded invocation checks its deadline and cancel token.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn wait_bounded(
        &self,
        child: &mut Child,
        invocation: &Invocation,
        limits: &ExecLimits,
    ) -> Result<ExitStatus> {
        let started = Instant::now();
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if limits.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                kill(child);
                return Err(BenchError::Cancelled {
                    command: invocation.display(),
                });
            }
            if let Some(timeout) = limits.timeout {
                if started.elapsed() >= timeout {
                    warn!(command = %invocation.display(), ?timeout, "bench.exec.timeout");
                    kill(child);
                    return Err(BenchError::Timeout {
                        command: invocation.display(),
                        timeout,
                    });
                }
            }
            thread::sleep(self.poll_interval);
        }
    }
}

impl BenchExecutor for ProcessExecutor {
    fn execute(&self, invocation: &Invocation, limits: &ExecLimits) -> Result<String> {
        debug!(command = %invocation.display(), "bench.exec.spawn");
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // A bounded run owns its process group so a timeout or cancel also
        // reaches whatever the elevation wrapper started.
        #[cfg(unix)]
        if limits.is_bounded() {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        let mut child = command
            .spawn()
            .map_err(|source| BenchError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        // On timeout or cancel the readers are left detached: a grandchild
        // started through the elevation wrapper may still hold the pipes.
        let status = if limits.is_bounded() {
            self.wait_bounded(&mut child, invocation, limits)?
        } else {
            child.wait()?
        };
        let stdout = join(stdout)?;
        let stderr = join(stderr)?;

        if !status.success() {
            return Err(BenchError::ExitStatus {
                command: invocation.display(),
                status: describe(status),
                stderr: tail(&String::from_utf8_lossy(&stderr), STDERR_TAIL_LINES),
            });
        }
        String::from_utf8(stdout).map_err(|_| BenchError::InvalidOutput {
            command: invocation.display(),
        })
    }
}

type PipeReader = JoinHandle<io::Result<Vec<u8>>>;

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<PipeReader> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            pipe.read_to_end(&mut buf)?;
            Ok(buf)
        })
    })
}

fn join(handle: Option<PipeReader>) -> Result<Vec<u8>> {
    let Some(handle) = handle else {
        return Ok(Vec::new());
    };
    let buf = handle
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "pipe reader panicked"))??;
    Ok(buf)
}

/// Stops the child and everything in its process group, then reaps it.
fn kill(child: &mut Child) {
    #[cfg(unix)]
    {
        terminate_group(child);
    }
    if let Err(err) = child.kill() {
        if err.kind() != io::ErrorKind::InvalidInput {
            warn!(%err, "bench.exec.kill_failed");
        }
    }
    let _ = child.wait();
}

/// SIGTERM first so `sudo` can relay it to the benchmark, SIGKILL for
/// anything still alive after the grace period.
#[cfg(unix)]
fn terminate_group(child: &mut Child) {
    let pgid = child.id();
    if let Err(err) = signal_group(pgid, libc::SIGTERM) {
        debug!(%err, pgid, "bench.exec.sigterm_failed");
    }
    let deadline = Instant::now() + TERM_GRACE;
    while Instant::now() < deadline {
        if matches!(child.try_wait(), Ok(Some(_))) {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    match signal_group(pgid, libc::SIGKILL) {
        Ok(()) => {}
        Err(err) if err.raw_os_error() == Some(libc::ESRCH) => {}
        Err(err) => warn!(%err, pgid, "bench.exec.group_kill_failed"),
    }
}

#[cfg(unix)]
#[allow(unsafe_code)]
fn signal_group(pgid: u32, signal: libc::c_int) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) takes plain integers; a negative pid addresses the
    // process group and touches no memory of ours.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

fn describe(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => format!("{status}"),
    }
}

fn tail(text: &str, lines: usize) -> String {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect();
    let start = kept.len().saturating_sub(lines);
    kept[start..].join("\n")
}
