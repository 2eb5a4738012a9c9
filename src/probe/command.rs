//! Builder for executing external tool commands with timeout support.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use renderforged_common::{Error, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// The child is killed if the returned future is dropped, so wrapping
/// [`ToolCommand::output`] in an outer timeout does not leak processes.
///
/// # Example
///
/// ```no_run
/// use renderforged::probe::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> renderforged_common::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("-v").arg("error")
///     .arg("-print_format").arg("json")
///     .arg("-show_format")
///     .arg("/path/to/video.mp4")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    /// Let the command run for as long as it takes.
    pub fn no_timeout(&mut self) -> &mut Self {
        self.timeout = None;
        self
    }

    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = std::io::Result<T>>,
    ) -> Result<T> {
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_elapsed| {
                Error::tool(self.program_name(), format!("timed out after {limit:?}"))
            })?,
            None => fut.await,
        };
        result.map_err(|e| {
            Error::tool(
                self.program_name(),
                format!("I/O error waiting for process: {e}"),
            )
        })
    }

    /// Run the command and capture its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tool`] if spawning fails, waiting fails, or the
    /// timeout expires.
    pub async fn output(&self) -> Result<ToolOutput> {
        let child = self
            .command()
            .spawn()
            .map_err(|e| Error::tool(self.program_name(), format!("failed to spawn: {e}")))?;

        let output = self.bounded(child.wait_with_output()).await?;
        Ok(ToolOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }

    /// Run the command, handing each stdout line to `on_line` as it arrives.
    ///
    /// Stderr is collected in the background and returned in the output;
    /// `stdout` of the returned [`ToolOutput`] is empty.
    pub async fn output_streaming(&self, mut on_line: impl FnMut(&str)) -> Result<ToolOutput> {
        let mut child = self
            .command()
            .spawn()
            .map_err(|e| Error::tool(self.program_name(), format!("failed to spawn: {e}")))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buf).await;
            }
            buf
        });

        let run = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Some(line) = lines.next_line().await? {
                    on_line(&line);
                }
            }
            child.wait().await
        };
        let status = self.bounded(run).await?;

        let stderr = stderr_task.await.unwrap_or_default();
        Ok(ToolOutput {
            status,
            stdout: String::new(),
            stderr,
        })
    }

    /// Execute the command, failing on a non-zero exit status.
    ///
    /// # Errors
    ///
    /// Everything [`ToolCommand::output`] returns, plus [`Error::Tool`]
    /// with the trimmed stderr when the process exits unsuccessfully.
    pub async fn execute(&self) -> Result<ToolOutput> {
        let output = self.output().await?;

        if !output.status.success() {
            return Err(Error::tool(
                self.program_name(),
                format!(
                    "exited with status {}: {}",
                    output.status,
                    output.stderr.trim()
                ),
            ));
        }

        Ok(output)
    }
}
