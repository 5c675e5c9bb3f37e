//! Host command execution with timeout enforcement
//!
//! Networking tools (`ping`, `nslookup`, `ip`, `dhclient`) are spawned with
//! captured output and polled until they exit or the timeout elapses.

use crate::error::{Error, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval while waiting for a child process
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished (or killed) command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Exit status was success
    pub success: bool,
    /// Process was killed after the timeout elapsed
    pub timed_out: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Stdout followed by stderr
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Run a program with arguments, killing it once `timeout` elapses
pub fn run(program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::CommandFailed {
            command: describe(program, args),
            message: e.to_string(),
        })?;

    let start = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = child
                    .stdout
                    .take()
                    .map(|mut s| {
                        let mut buf = String::new();
                        s.read_to_string(&mut buf).ok();
                        buf
                    })
                    .unwrap_or_default();
                let stderr = child
                    .stderr
                    .take()
                    .map(|mut s| {
                        let mut buf = String::new();
                        s.read_to_string(&mut buf).ok();
                        buf
                    })
                    .unwrap_or_default();
                return Ok(CommandOutput {
                    success: status.success(),
                    timed_out: false,
                    stdout,
                    stderr,
                });
            }
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait(); // Reap the zombie
                    return Ok(CommandOutput {
                        success: false,
                        timed_out: true,
                        stdout: String::new(),
                        stderr: format!("timed out after {:?}", timeout),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                return Err(Error::CommandFailed {
                    command: describe(program, args),
                    message: format!("Failed to wait for process: {}", e),
                });
            }
        }
    }
}

/// Run a command and turn a non-zero exit or timeout into an error
pub fn run_checked(program: &str, args: &[&str], timeout: Duration) -> Result<CommandOutput> {
    let output = run(program, args, timeout)?;
    if output.timed_out {
        return Err(Error::CommandTimeout {
            command: describe(program, args),
            seconds: timeout.as_secs(),
        });
    }
    if !output.success {
        return Err(Error::CommandFailed {
            command: describe(program, args),
            message: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

/// Check whether a program is present on `PATH`
pub fn tool_available(program: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(program))))
        .unwrap_or(false)
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

fn describe(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
