use crate::error::RunnerError;
use std::time::Duration;

use super::CommandSpec;

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

impl ProcessOutput {
    #[must_use]
    pub fn new(stdout: Vec<u8>, stderr: Vec<u8>, exit_code: Option<i32>, timed_out: bool) -> Self {
        Self {
            stdout,
            stderr,
            exit_code,
            timed_out,
        }
    }

    #[must_use]
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    #[must_use]
    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out
    }
}

/// Synchronous process execution.
///
/// Implementations block the calling thread; async callers run them on
/// `tokio::task::spawn_blocking`.
pub trait ProcessRunner: Send + Sync {
    /// Run `cmd` to completion or until `timeout` elapses.
    ///
    /// A non-zero exit is an `Ok` output; only spawn failures and timeouts
    /// are errors.
    fn run(&self, cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockRunner {
        output: ProcessOutput,
    }

    impl ProcessRunner for MockRunner {
        fn run(&self, _cmd: &CommandSpec, _timeout: Duration) -> Result<ProcessOutput, RunnerError> {
            Ok(self.output.clone())
        }
    }

    struct TimeoutRunner;

    impl ProcessRunner for TimeoutRunner {
        fn run(&self, _cmd: &CommandSpec, timeout: Duration) -> Result<ProcessOutput, RunnerError> {
            Err(RunnerError::Timeout {
                timeout_seconds: timeout.as_secs(),
            })
        }
    }

    #[test]
    fn success_requires_zero_exit_and_no_timeout() {
        assert!(ProcessOutput::new(Vec::new(), Vec::new(), Some(0), false).success());
        assert!(!ProcessOutput::new(Vec::new(), Vec::new(), Some(1), false).success());
        assert!(!ProcessOutput::new(Vec::new(), Vec::new(), Some(0), true).success());
        assert!(!ProcessOutput::new(Vec::new(), Vec::new(), None, false).success());
    }

    #[test]
    fn lossy_strings_do_not_panic() {
        let output = ProcessOutput::new(vec![0xff, b'a'], b"err".to_vec(), Some(0), false);
        assert!(output.stdout_string().ends_with('a'));
        assert_eq!(output.stderr_string(), "err");
    }

    #[test]
    fn trait_objects_dispatch() {
        let runners: Vec<Box<dyn ProcessRunner>> = vec![
            Box::new(MockRunner {
                output: ProcessOutput::new(b"{}\n".to_vec(), Vec::new(), Some(0), false),
            }),
            Box::new(TimeoutRunner),
        ];
        let cmd = CommandSpec::new("wayfarer");

        let first = runners[0].run(&cmd, Duration::from_secs(5)).unwrap();
        assert_eq!(first.stdout_string(), "{}\n");

        let second = runners[1].run(&cmd, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(second, RunnerError::Timeout { timeout_seconds: 5 }));
    }
}
