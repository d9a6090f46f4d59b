use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use log::debug;
use tokio::process::Command;
use tokio::runtime::{Builder, Runtime};

/// Why an external program produced no usable output.
#[derive(Debug)]
pub(crate) enum RunFailure {
    /// The program could not be started or waited on
    Io(io::Error),
    /// The program was killed after exceeding its time limit
    TimedOut,
}

#[derive(Debug)]
pub(crate) struct ProgramOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Builds the single-threaded runtime that drives child processes.
pub(crate) fn create_runtime() -> io::Result<Runtime> {
    Builder::new_current_thread().enable_all().build()
}

/// Runs `program` to completion and captures its output.
///
/// With a `timeout`, the child is killed once the limit passes. Must not be
/// called from inside another tokio runtime.
pub(crate) fn run_program(
    runtime: &Runtime,
    program: &Path,
    args: &[OsString],
    timeout: Option<Duration>,
) -> Result<ProgramOutput, RunFailure> {
    debug!("Running {:?} with {} argument(s)", program, args.len());
    runtime.block_on(async {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(RunFailure::Io)?;

        // Dropping the wait future on timeout drops the child, which kills it
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| RunFailure::TimedOut)?,
            None => child.wait_with_output().await,
        }
        .map_err(RunFailure::Io)?;

        Ok::<_, RunFailure>(ProgramOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<OsString> {
        vec!["-c".into(), script.into()]
    }

    #[test]
    fn test_captures_output_and_status() {
        let runtime = create_runtime().unwrap();
        let output = run_program(&runtime, Path::new("sh"), &sh("echo out; echo err >&2; exit 3"), None).unwrap();
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err");
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn test_timeout_kills_program() {
        let runtime = create_runtime().unwrap();
        let started = std::time::Instant::now();
        let result = run_program(
            &runtime,
            Path::new("sh"),
            &sh("sleep 5"),
            Some(Duration::from_millis(200)),
        );
        assert!(matches!(result, Err(RunFailure::TimedOut)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_program() {
        let runtime = create_runtime().unwrap();
        let result = run_program(&runtime, Path::new("/nonexistent/vecspace-backend"), &[], None);
        assert!(matches!(result, Err(RunFailure::Io(_))));
    }
}
