//! Supervision of the external solver process.

mod cancel;

pub use cancel::{cancel_channel, CancelHandle, CancelToken};

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::ProcessError;
use crate::solver::{SolverInvocation, SolverOutputs};

/// Interval between child status checks.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Bytes kept from the end of the solver log.
const DIAGNOSTIC_TAIL: u64 = 4096;

/// Terminal state of one supervised solver run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisedRun {
    /// Exit status 0 and the declared output exists.
    Completed {
        outputs: SolverOutputs,
        diagnostics: String,
        elapsed: Duration,
    },
    /// Spawn failure, non-zero exit, timeout, or missing output.
    Failed {
        exit_code: Option<i32>,
        diagnostics: String,
        elapsed: Duration,
    },
    /// The child was killed on request.
    Cancelled { elapsed: Duration },
}

/// Launches a [`SolverInvocation`] and blocks until it ends.
///
/// The child's stdout and stderr go to the invocation's log file; the tail of
/// that log becomes the diagnostic text.
///
/// On Unix the child leads its own process group, and the whole group is
/// killed when the run is cancelled, times out or unwinds. Anything the
/// solver forked is swept the same way after it exits. On Linux the child
/// also receives `SIGKILL` if the supervising thread dies without unwinding.
pub struct Supervisor<'a> {
    invocation: &'a SolverInvocation,
}

impl<'a> Supervisor<'a> {
    /// Creates a new `Supervisor` for one invocation.
    #[must_use]
    pub fn new(invocation: &'a SolverInvocation) -> Self {
        Self { invocation }
    }

    /// Runs the solver to completion, cancellation or timeout.
    ///
    /// No retry is attempted.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessError`] if the log file cannot be created or the
    /// child's status cannot be queried.
    pub fn run(&self, cancel: &CancelToken) -> Result<SupervisedRun, ProcessError> {
        let inv = self.invocation;
        let log_err = |source| ProcessError::Log {
            path: inv.log.clone(),
            source,
        };
        let stdout = File::create(&inv.log).map_err(log_err)?;
        let stderr = stdout.try_clone().map_err(log_err)?;

        info!(program = %inv.program.display(), "starting solver");
        debug!(args = ?inv.args, cwd = %inv.working_dir.display(), "solver command line");

        let started = Instant::now();
        let child = spawn(inv, stdout, stderr);
        let mut child = match child {
            Ok(child) => ChildGuard::new(child),
            Err(e) => {
                warn!(error = %e, "failed to spawn solver");
                return Ok(SupervisedRun::Failed {
                    exit_code: None,
                    diagnostics: format!("failed to spawn {}: {e}", inv.program.display()),
                    elapsed: started.elapsed(),
                });
            }
        };

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if cancel.wait(POLL_INTERVAL) {
                child.kill();
                info!(elapsed = ?started.elapsed(), "solver cancelled");
                return Ok(SupervisedRun::Cancelled {
                    elapsed: started.elapsed(),
                });
            }
            if let Some(limit) = inv.timeout {
                if started.elapsed() >= limit {
                    child.kill();
                    warn!(?limit, "solver timed out");
                    return Ok(SupervisedRun::Failed {
                        exit_code: None,
                        diagnostics: format!(
                            "solver timed out after {limit:?}\n{}",
                            read_tail(&inv.log)
                        ),
                        elapsed: started.elapsed(),
                    });
                }
            }
        };

        let elapsed = started.elapsed();
        let diagnostics = read_tail(&inv.log);
        info!(?status, ?elapsed, "solver finished");
        Ok(classify(status, inv, diagnostics, elapsed))
    }
}

fn spawn(inv: &SolverInvocation, stdout: File, stderr: File) -> io::Result<Child> {
    let mut command = Command::new(&inv.program);
    command
        .args(&inv.args)
        .current_dir(&inv.working_dir)
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr);

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;

        command.process_group(0);

        #[cfg(target_os = "linux")]
        {
            use nix::sys::signal::Signal;
            use nix::unistd::{getpid, getppid};

            let parent = getpid();
            // SAFETY: runs in the forked child before exec and only issues
            // the async-signal-safe prctl and getppid syscalls.
            unsafe {
                command.pre_exec(move || {
                    nix::sys::prctl::set_pdeathsig(Signal::SIGKILL)?;
                    // The host died between fork and prctl.
                    if getppid() != parent {
                        return Err(nix::errno::Errno::ESRCH.into());
                    }
                    Ok(())
                });
            }
        }
    }

    command.spawn()
}

fn classify(
    status: ExitStatus,
    inv: &SolverInvocation,
    diagnostics: String,
    elapsed: Duration,
) -> SupervisedRun {
    if !status.success() {
        return SupervisedRun::Failed {
            exit_code: status.code(),
            diagnostics,
            elapsed,
        };
    }
    let outputs = inv.output.locate();
    if outputs.files.is_empty() {
        return SupervisedRun::Failed {
            exit_code: Some(0),
            diagnostics: format!("solver exited successfully but wrote no output\n{diagnostics}"),
            elapsed,
        };
    }
    SupervisedRun::Completed {
        outputs,
        diagnostics,
        elapsed,
    }
}

/// Owns a running child; kills its process group and reaps it if dropped
/// before it exits.
struct ChildGuard {
    child: Option<Child>,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child: Some(child) }
    }

    fn try_wait(&mut self) -> Result<Option<ExitStatus>, ProcessError> {
        let Some(child) = self.child.as_mut() else {
            return Ok(None);
        };
        let status = child.try_wait().map_err(ProcessError::Wait)?;
        if status.is_some() {
            // The solver is gone; leftovers it forked may still hold the group.
            #[cfg(unix)]
            if let Err(e) = kill_group(child) {
                debug!(error = %e, "failed to sweep solver process group");
            }
            self.child = None;
        }
        Ok(status)
    }

    fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            #[cfg(unix)]
            let killed = kill_group(&child);
            #[cfg(not(unix))]
            let killed = child.kill();
            if let Err(e) = killed {
                debug!(error = %e, "kill failed, child already gone");
            }
            if let Err(e) = child.wait() {
                warn!(error = %e, "failed to reap solver process");
            }
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Sends `SIGKILL` to the process group led by `child`.
///
/// An empty group is not an error.
#[cfg(unix)]
fn kill_group(child: &Child) -> io::Result<()> {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(child.id()).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Reads the last [`DIAGNOSTIC_TAIL`] bytes of the solver log.
fn read_tail(path: &Path) -> String {
    let Ok(mut file) = File::open(path) else {
        return String::new();
    };
    let len = file.metadata().map(|m| m.len()).unwrap_or(0);
    let start = len.saturating_sub(DIAGNOSTIC_TAIL);
    if file.seek(SeekFrom::Start(start)).is_err() {
        return String::new();
    }
    let mut bytes = Vec::new();
    if file.read_to_end(&mut bytes).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&bytes).trim_end().to_string()
}
