use crate::error::RunnerError;
use std::io::Write;
use std::process::Stdio;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CommandSpec, ProcessOutput, ProcessRunner};

/// Process runner on top of `std::process::Command`.
///
/// Waiting happens on a helper thread so the timeout can be enforced with
/// `recv_timeout`; on expiry the child is killed. The stdin payload, when
/// present, is fed from a second thread so a child that writes a lot before
/// reading cannot deadlock against us.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeRunner;

impl NativeRunner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn terminate_process(pid: u32) {
        #[cfg(unix)]
        {
            if let Ok(pid) = libc::pid_t::try_from(pid) {
                // SAFETY: plain signal delivery to a child we spawned
                unsafe {
                    libc::kill(pid, libc::SIGKILL);
                }
            }
        }

        #[cfg(not(unix))]
        {
            // TODO: use TerminateProcess once a Windows target needs hard timeouts
            let _ = pid;
        }
    }
}

impl ProcessRunner for NativeRunner {
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError> {
        let mut command = cmd.to_command();
        command
            .stdin(if cmd.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| RunnerError::SpawnFailed {
            program: cmd.program_display(),
            reason: e.to_string(),
        })?;
        let child_id = child.id();
        debug!(program = %cmd.program_display(), pid = child_id, "Spawned process");

        let writer = match (child.stdin.take(), cmd.stdin.clone()) {
            (Some(mut stdin), Some(payload)) => Some(thread::spawn(move || {
                // Dropping stdin closes the pipe; a child that exits early yields BrokenPipe
                if let Err(e) = stdin.write_all(&payload)
                    && e.kind() != std::io::ErrorKind::BrokenPipe
                {
                    warn!(error = %e, "Failed to write stdin payload");
                }
            })),
            _ => None,
        };

        let (tx, rx) = mpsc::channel();
        let waiter = thread::spawn(move || {
            let _ = tx.send(child.wait_with_output());
        });

        let result = match rx.recv_timeout(timeout) {
            Ok(output) => {
                let _ = waiter.join();
                let output = output.map_err(|e| RunnerError::NativeExecutionFailed {
                    reason: format!("Failed to wait for process: {e}"),
                })?;
                Ok(ProcessOutput::new(
                    output.stdout,
                    output.stderr,
                    output.status.code(),
                    false,
                ))
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(pid = child_id, timeout_secs = timeout.as_secs(), "Process timed out, killing");
                Self::terminate_process(child_id);
                let _ = waiter.join();
                Err(RunnerError::Timeout {
                    timeout_seconds: timeout.as_secs(),
                })
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(RunnerError::NativeExecutionFailed {
                reason: "Process monitoring thread terminated unexpectedly".to_string(),
            }),
        };

        if let Some(writer) = writer {
            let _ = writer.join();
        }
        result
    }
}
