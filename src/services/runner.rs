use crate::services::command::CommandLine;
use camino::{Utf8Path, Utf8PathBuf};
use std::future::Future;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// `CREATE_NO_WINDOW` process creation flag
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Output of a finished generator run
#[derive(Debug, Clone, Default)]
pub struct ProcessResult {
    /// The process ran to completion and was waited on
    pub completed: bool,
    /// Exit code, `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub duration: Duration,
}

impl ProcessResult {
    /// Completed with exit code 0
    pub fn success(&self) -> bool {
        self.completed && self.exit_code == Some(0)
    }

    /// Anything was written to stderr
    pub fn has_errors(&self) -> bool {
        !self.stderr.is_empty()
    }
}

/// Errors that can occur while running the generator
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Output read before the failure is kept in `stdout`/`stderr`
    #[error("Failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
        stdout: Vec<String>,
        stderr: Vec<String>,
    },
}

/// Launches an external program and collects its output.
///
/// The orchestrator is generic over this so tests can record invocations
/// instead of spawning processes.
pub trait Launcher {
    fn launch(
        &self,
        program: &str,
        command_line: &CommandLine,
    ) -> impl Future<Output = Result<ProcessResult, RunnerError>> + Send;
}

/// Runs the generator as a child process.
///
/// One child per [`run`](Self::run) call. Stdout and stderr are drained line by
/// line on two reader tasks while the caller waits for the child to exit; the
/// lines are only handed back once both streams are closed. Order is kept within
/// each stream but not across them.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    working_dir: Option<Utf8PathBuf>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run the child from this directory (the project root, so relative script
    /// and output paths resolve the same way they do in the hook)
    pub fn with_working_dir<P: AsRef<Utf8Path>>(mut self, dir: P) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Run `program` with the given arguments and wait for it to exit
    pub async fn run(
        &self,
        program: &str,
        command_line: &CommandLine,
    ) -> Result<ProcessResult, RunnerError> {
        tracing::info!("Running: {} {}", program, command_line);

        let start = Instant::now();

        let mut cmd = Command::new(program);
        cmd.args(command_line.tokens())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        apply_utf8_environment(&mut cmd);

        #[cfg(windows)]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let mut child = cmd.spawn().map_err(|source| RunnerError::Launch {
            program: program.to_string(),
            source,
        })?;

        let stdout_task = child.stdout.take().map(|out| tokio::spawn(collect_lines(out)));
        let stderr_task = child.stderr.take().map(|err| tokio::spawn(collect_lines(err)));

        let status = child.wait().await;
        if status.is_err() {
            // Close the pipes so the readers can finish
            if let Err(e) = child.start_kill() {
                tracing::warn!("Failed to kill {}: {}", program, e);
            }
        }

        finish(program, status, stdout_task, stderr_task, start).await
    }
}

/// Join both readers, then turn the wait status into a result
async fn finish(
    program: &str,
    status: std::io::Result<ExitStatus>,
    stdout_task: Option<JoinHandle<Vec<String>>>,
    stderr_task: Option<JoinHandle<Vec<String>>>,
    start: Instant,
) -> Result<ProcessResult, RunnerError> {
    let stdout = join_lines(stdout_task).await;
    let stderr = join_lines(stderr_task).await;

    let status = match status {
        Ok(status) => status,
        Err(source) => {
            tracing::error!(
                "Lost track of {} after {} stdout and {} stderr lines",
                program,
                stdout.len(),
                stderr.len()
            );
            return Err(RunnerError::Wait {
                program: program.to_string(),
                source,
                stdout,
                stderr,
            });
        }
    };

    let result = ProcessResult {
        completed: true,
        exit_code: status.code(),
        stdout,
        stderr,
        duration: start.elapsed(),
    };

    tracing::info!(
        "{} completed in {:.2}s with exit code {:?}",
        program,
        result.duration.as_secs_f32(),
        result.exit_code
    );

    Ok(result)
}

impl Launcher for ProcessRunner {
    fn launch(
        &self,
        program: &str,
        command_line: &CommandLine,
    ) -> impl Future<Output = Result<ProcessResult, RunnerError>> + Send {
        self.run(program, command_line)
    }
}

/// Force UTF-8 I/O in the Python child
fn apply_utf8_environment(cmd: &mut Command) {
    cmd.env("PYTHONIOENCODING", "utf-8");

    // Windows consoles otherwise transcode through the legacy code page
    if cfg!(target_os = "windows") {
        cmd.env("PYTHONUTF8", "1");
        cmd.env("PYTHONLEGACYWINDOWSSTDIO", "0");
    }
}

/// Read a stream to EOF, one entry per non-empty line
async fn collect_lines<R: AsyncRead + Unpin>(stream: R) -> Vec<String> {
    let mut reader = BufReader::new(stream);
    let mut lines = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                let line = text.trim_end_matches(['\n', '\r']);
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
            Err(e) => {
                tracing::warn!("Stopped reading process output: {}", e);
                break;
            }
        }
    }

    lines
}

async fn join_lines(task: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    match task {
        Some(handle) => handle.await.unwrap_or_else(|e| {
            tracing::warn!("Output reader task failed: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    }
}
