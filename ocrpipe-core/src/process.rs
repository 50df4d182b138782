//! External Process Runner
//!
//! Uniform wrapper around invoking an external executable. Every tool call in
//! the pipeline goes through a [`CommandRunner`], which normalizes the three
//! possible outcomes:
//!
//! - success: captured stdout/stderr bytes
//! - executable not on the search path: [`OcrError::MissingExecutable`]
//! - exit code outside the accepted set: [`OcrError::ExternalTool`]
//!
//! [`SystemRunner`] is the real implementation. Tests substitute their own
//! runner to script tool behavior without touching the filesystem PATH.

use crate::error::{OcrError, Result};
use std::ffi::{OsStr, OsString};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often a child with a deadline is polled for completion
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A single external tool call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<OsString>,
    /// Bytes written to the child's stdin; `None` attaches stdin to null
    pub stdin: Option<Vec<u8>>,
    /// Exit codes treated as success
    pub ok_codes: Vec<i32>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            ok_codes: vec![0],
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn stdin(mut self, bytes: Vec<u8>) -> Self {
        self.stdin = Some(bytes);
        self
    }

    pub fn ok_codes(mut self, codes: &[i32]) -> Self {
        self.ok_codes = codes.to_vec();
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Short tool name used in error messages ("tesseract", not "/usr/bin/tesseract")
    pub fn tool_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone())
    }

    /// Full argument vector, space-joined, for logging
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Argument at `index`, lossily decoded
    pub fn arg_str(&self, index: usize) -> Option<String> {
        self.args
            .get(index)
            .map(|a| a.to_string_lossy().into_owned())
    }
}

/// Captured output of a successful tool call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub code: Option<i32>,
}

impl ToolOutput {
    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs external tools on behalf of the pipeline
///
/// Implementations must be shareable across worker threads: one runner
/// serves every document in a batch.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// Runs tools as real child processes via `std::process::Command`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        tracing::debug!("Executing command: {}", invocation.command_line());

        let mut child = spawn(invocation)?;
        // The limit covers the whole call, including draining the pipes,
        // which stay open as long as any descendant of the tool holds them
        let deadline = invocation.timeout.map(|limit| Instant::now() + limit);

        let stdin_writer = match (invocation.stdin.clone(), child.stdin.take()) {
            (Some(bytes), Some(pipe)) => Some(spawn_writer(pipe, bytes)),
            _ => None,
        };
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let status = match deadline {
            Some(deadline) => wait_with_deadline(&mut child, deadline, invocation)?,
            None => child.wait()?,
        };

        let stdout = collect_output(stdout_reader, deadline, invocation)?;
        let stderr = collect_output(stderr_reader, deadline, invocation)?;

        if let Some(writer) = stdin_writer {
            // The child may legitimately exit before draining stdin
            if writer.is_finished() {
                if let Ok(Err(e)) = writer.join() {
                    tracing::debug!("stdin write to {} ended early: {}", invocation.tool_name(), e);
                }
            }
        }

        let code = status.code();
        if code.map_or(true, |c| !invocation.ok_codes.contains(&c)) {
            let stderr_decoded = String::from_utf8_lossy(&stderr);
            tracing::debug!(
                "Command {} returned {:?} (stderr: {})",
                invocation.command_line(),
                code,
                if stderr_decoded.trim().is_empty() {
                    "<empty>"
                } else {
                    stderr_decoded.trim()
                }
            );
            let err = OcrError::tool_failure(&invocation.tool_name(), code, &stderr);
            tracing::error!("{}", err);
            return Err(err);
        }

        Ok(ToolOutput {
            stdout,
            stderr,
            code,
        })
    }
}

fn spawn(invocation: &Invocation) -> Result<Child> {
    Command::new(&invocation.program)
        .args(&invocation.args)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                tracing::error!("Missing binary: {}", invocation.program);
                OcrError::MissingExecutable {
                    name: invocation.program.clone(),
                }
            } else {
                OcrError::Io(e)
            }
        })
}

fn spawn_writer<W: Write + Send + 'static>(mut pipe: W, bytes: Vec<u8>) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || {
        pipe.write_all(&bytes)?;
        pipe.flush()
        // pipe dropped here, closing the child's stdin
    })
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> Receiver<io::Result<Vec<u8>>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = source.read_to_end(&mut buf).map(|_| buf);
        // Receiver is gone only if the call already timed out
        let _ = tx.send(result);
    });
    rx
}

fn collect_output(
    reader: Option<Receiver<io::Result<Vec<u8>>>>,
    deadline: Option<Instant>,
    invocation: &Invocation,
) -> Result<Vec<u8>> {
    let Some(rx) = reader else {
        return Ok(Vec::new());
    };
    let received = match deadline {
        Some(deadline) => match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(received) => received,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "{} exited but its output stayed open past the deadline",
                    invocation.tool_name()
                );
                return Err(timeout_error(invocation));
            }
            Err(RecvTimeoutError::Disconnected) => return Err(reader_panicked()),
        },
        None => rx.recv().map_err(|_| reader_panicked())?,
    };
    received.map_err(OcrError::from)
}

fn reader_panicked() -> OcrError {
    OcrError::Io(io::Error::new(io::ErrorKind::Other, "output reader thread panicked"))
}

fn timeout_error(invocation: &Invocation) -> OcrError {
    OcrError::Timeout {
        tool: invocation.tool_name(),
        after: invocation.timeout.unwrap_or_default(),
    }
}

fn wait_with_deadline(child: &mut Child, deadline: Instant, invocation: &Invocation) -> Result<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            tracing::warn!(
                "{} exceeded {:.1}s, killing it",
                invocation.tool_name(),
                invocation.timeout.unwrap_or_default().as_secs_f64()
            );
            // kill fails only if the child already exited; reap either way
            let _ = child.kill();
            let _ = child.wait();
            return Err(timeout_error(invocation));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Resolve an executable the way the OS would when spawning it
///
/// Names containing a path separator are checked directly; bare names are
/// searched on `PATH`.
pub fn locate_executable(name: &str) -> Option<PathBuf> {
    let candidate = Path::new(name);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .flat_map(|dir| executable_names(name).into_iter().map(move |n| dir.join(n)))
        .find(|path| is_executable(path))
}

/// Eager pre-check: fail with the first executable that cannot be found
pub fn require_executables(names: &[&str]) -> Result<()> {
    for name in names {
        match locate_executable(name) {
            Some(path) => tracing::debug!("Found {} at {}", name, path.display()),
            None => {
                tracing::error!("Missing binary: {}", name);
                return Err(OcrError::MissingExecutable {
                    name: name.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(windows)]
fn executable_names(name: &str) -> Vec<String> {
    if Path::new(name).extension().is_some() {
        vec![name.to_string()]
    } else {
        vec![name.to_string(), format!("{name}.exe")]
    }
}

#[cfg(not(windows))]
fn executable_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
