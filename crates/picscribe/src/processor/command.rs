//! Running external tools (`exiftool`, `heif-convert`) with a deadline.

use std::ffi::OsStr;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::ProcessError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// Runs `program` with `args`, killing it once `timeout` elapses.
///
/// A non-zero exit status is an error carrying the tool's stderr.
pub fn run_with_timeout<I, S>(
    program: &str,
    args: I,
    timeout: Duration,
) -> Result<CommandOutput, ProcessError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ProcessError::Command {
            program: program.to_string(),
            message: format!("failed to start: {}", e),
        })?;

    // Drain both pipes concurrently so a chatty tool cannot block on a full
    // pipe while we wait for it to exit.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = match wait_until(&mut child, timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            debug!(program, "killing after {:?}", timeout);
            let _ = child.kill();
            let _ = child.wait();
            return Err(ProcessError::Timeout(timeout));
        }
        Err(e) => {
            let _ = child.kill();
            return Err(ProcessError::Command {
                program: program.to_string(),
                message: format!("failed to wait: {}", e),
            });
        }
    };

    let output = CommandOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    };

    if !output.status.success() {
        let stderr = output.stderr.trim();
        let message = if stderr.is_empty() {
            format!("exited with {}", output.status)
        } else {
            stderr.to_string()
        };
        return Err(ProcessError::Command {
            program: program.to_string(),
            message,
        });
    }

    Ok(output)
}

fn wait_until(child: &mut Child, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
