//! Blocking execution of external programs.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, BufRead, BufReader, ErrorKind, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use thiserror::Error;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: OsString,
    args: Vec<OsString>,
}

impl CommandLine {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn program(&self) -> &OsStr {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Program name for messages, lossy.
    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Errors from running an external program.
#[derive(Error, Debug)]
pub enum RunError {
    /// The program does not exist or is not on `PATH`.
    #[error("{program}: command not found")]
    NotFound { program: String },

    /// The process could not be started.
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Waiting for the started process failed.
    #[error("Failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process ran but did not exit successfully. `stderr` holds the
    /// last lines it wrote there.
    #[error("{program} {}{}", exit_reason(.code), last_line(.stderr))]
    Failed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The process was killed after exceeding its time limit.
    #[error("{program} did not finish within {}s and was killed", .timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },
}

fn exit_reason(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {}", code),
        None => "was terminated by a signal".to_string(),
    }
}

fn last_line(stderr: &str) -> String {
    match stderr.lines().last() {
        Some(line) => format!(": {}", line),
        None => String::new(),
    }
}

/// Number of stderr lines kept for [`RunError::Failed`].
pub const STDERR_TAIL_LINES: usize = 20;

/// Forward the child's stderr to the log, line by line, and hand back the
/// last [`STDERR_TAIL_LINES`] lines once the stream closes.
fn forward_stderr<R: Read + Send + 'static>(program: String, stderr: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
        for chunk in BufReader::new(stderr).split(b'\n') {
            let Ok(chunk) = chunk else { break };
            let line = String::from_utf8_lossy(&chunk);
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            info!("{}: {}", program, line);
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.to_string());
        }
        Vec::from(tail).join("\n")
    })
}

/// Runs a command line to completion.
pub trait ProcessRunner: Send + Sync {
    /// Run `command`, blocking until it exits. With a `timeout`, the process
    /// is killed once the limit is exceeded.
    fn run(&self, command: &CommandLine, timeout: Option<Duration>) -> Result<(), RunError>;
}

/// [`ProcessRunner`] backed by [`std::process::Command`].
///
/// The child inherits stdout and its stdin is closed. Its stderr is read
/// on a helper thread: every line goes to the log at `info` level and the
/// tail is attached to [`RunError::Failed`].
#[derive(Debug, Clone)]
pub struct SystemRunner {
    poll_interval: Duration,
}

impl SystemRunner {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    fn wait_with_timeout(
        &self,
        child: &mut Child,
        program: &str,
        timeout: Duration,
    ) -> Result<ExitStatus, RunError> {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            debug!("{:?} is beyond any deadline, waiting without one", timeout);
            return wait(child, program);
        };
        loop {
            if let Some(status) = child.try_wait().map_err(|source| RunError::Wait {
                program: program.to_string(),
                source,
            })? {
                return Ok(status);
            }

            if Instant::now() >= deadline {
                warn!("{} still running after {:?}, killing it", program, timeout);
                if let Err(e) = child.kill() {
                    warn!("Failed to kill {}: {}", program, e);
                }
                let _ = child.wait();
                return Err(RunError::TimedOut {
                    program: program.to_string(),
                    timeout,
                });
            }

            thread::sleep(self.poll_interval);
        }
    }
}

fn wait(child: &mut Child, program: &str) -> Result<ExitStatus, RunError> {
    child.wait().map_err(|source| RunError::Wait {
        program: program.to_string(),
        source,
    })
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &CommandLine, timeout: Option<Duration>) -> Result<(), RunError> {
        info!("{}", command);

        let program = command.program_name();
        let mut child = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| match source.kind() {
                ErrorKind::NotFound => RunError::NotFound {
                    program: program.clone(),
                },
                _ => RunError::Spawn {
                    program: program.clone(),
                    source,
                },
            })?;
        let stderr = child
            .stderr
            .take()
            .map(|stderr| forward_stderr(program.clone(), stderr));

        // On a timeout the reader thread is left to finish on its own.
        let status = match timeout {
            Some(timeout) => self.wait_with_timeout(&mut child, &program, timeout)?,
            None => wait(&mut child, &program)?,
        };
        debug!("{} finished: {}", program, status);

        let stderr = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(RunError::Failed {
                program,
                code: status.code(),
                stderr,
            })
        }
    }
}
