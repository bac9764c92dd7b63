//! Quality-tool command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use vqe_models::Asset;

use crate::error::{MediaError, MediaResult};

/// Builder for an external quality-tool invocation.
///
/// Arguments are carried as a list and passed to the process verbatim; no
/// shell is involved. The standard quality tools share one positional
/// convention: `<tool> <pix_fmt> <ref> <dis> <w> <h> [start end]`, which
/// [`ToolCommand::for_asset`] produces.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    /// Program name (resolved against PATH or an explicit tool dir)
    program: String,
    /// Positional arguments
    args: Vec<String>,
    /// File the tool's stdout is captured to
    log_path: PathBuf,
}

impl ToolCommand {
    /// Create a command with explicit arguments.
    pub fn new(program: impl Into<String>, log_path: impl AsRef<Path>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            log_path: log_path.as_ref().to_path_buf(),
        }
    }

    /// Create a command with the standard quality-tool argument shape for
    /// an asset: `<pix_fmt> <ref> <dis> <w> <h> [start end]`.
    pub fn for_asset(
        program: impl Into<String>,
        asset: &Asset,
        log_path: impl AsRef<Path>,
    ) -> Self {
        let mut cmd = Self::new(program, log_path);
        cmd = cmd
            .arg(asset.pixel_format().as_str())
            .arg(asset.reference_path().to_string_lossy())
            .arg(asset.distorted_path().to_string_lossy())
            .arg(asset.width().to_string())
            .arg(asset.height().to_string());
        if let Some(range) = asset.frame_range() {
            cmd = cmd.arg(range.start.to_string()).arg(range.end.to_string());
        }
        cmd
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Build the argument list.
    pub fn build_args(&self) -> Vec<String> {
        self.args.clone()
    }
}

/// Runner for quality-tool commands with timeout handling.
///
/// The tool's stdout is streamed line by line into the command's log file;
/// stderr is buffered for diagnostics on failure.
pub struct ToolRunner {
    /// Directory the program is resolved from instead of PATH
    tool_dir: Option<PathBuf>,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for ToolRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRunner {
    /// Create a new runner resolving programs from PATH.
    pub fn new() -> Self {
        Self {
            tool_dir: None,
            timeout_secs: None,
        }
    }

    /// Resolve programs from an explicit directory instead of PATH.
    pub fn with_tool_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.tool_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Resolve the program path.
    fn resolve(&self, program: &str) -> MediaResult<PathBuf> {
        match &self.tool_dir {
            Some(dir) => {
                let path = dir.join(program);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(MediaError::ToolNotFound(program.to_string()))
                }
            }
            None => {
                which::which(program).map_err(|_| MediaError::ToolNotFound(program.to_string()))
            }
        }
    }

    /// Run a command, capturing its stdout to the log file.
    ///
    /// Fails with [`MediaError::ToolFailed`] on non-zero exit and with
    /// [`MediaError::MissingLog`] when the tool exits cleanly but wrote
    /// nothing.
    pub async fn run(&self, cmd: &ToolCommand) -> MediaResult<()> {
        let program = self.resolve(cmd.program())?;
        let args = cmd.build_args();
        debug!(
            tool = cmd.program(),
            log = %cmd.log_path().display(),
            "Running quality tool: {} {}",
            program.display(),
            args.join(" ")
        );

        if let Some(parent) = cmd.log_path().parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().expect("stdout not captured");
        let stderr = child.stderr.take().expect("stderr not captured");

        // Stream stdout into the log file as lines arrive
        let log_path = cmd.log_path().to_path_buf();
        let log_task = tokio::spawn(async move {
            let mut log_file = tokio::fs::File::create(&log_path).await?;
            let mut lines = BufReader::new(stdout).lines();
            let mut wrote = false;
            while let Ok(Some(line)) = lines.next_line().await {
                log_file.write_all(line.as_bytes()).await?;
                log_file.write_all(b"\n").await?;
                wrote = true;
            }
            log_file.flush().await?;
            Ok::<bool, std::io::Error>(wrote)
        });

        // Buffer stderr for diagnostics
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                buf.push_str(&line);
                buf.push('\n');
            }
            buf
        });

        let status = match self.timeout_secs {
            Some(secs) => {
                let timeout =
                    tokio::time::timeout(std::time::Duration::from_secs(secs), child.wait());
                match timeout.await {
                    Ok(status) => status?,
                    Err(_) => {
                        warn!(
                            tool = cmd.program(),
                            timeout_secs = secs,
                            "Quality tool timed out, killing process"
                        );
                        let _ = child.kill().await;
                        return Err(MediaError::Timeout(cmd.program().to_string(), secs));
                    }
                }
            }
            None => child.wait().await?,
        };

        let wrote = log_task.await.map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::Other, format!("log task failed: {}", e))
        })??;
        let stderr_buf = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(MediaError::tool_failed(
                cmd.program(),
                status.code(),
                if stderr_buf.is_empty() {
                    None
                } else {
                    Some(tail(&stderr_buf, 2048))
                },
            ));
        }

        if !wrote {
            return Err(MediaError::MissingLog {
                tool: cmd.program().to_string(),
                path: cmd.log_path().to_path_buf(),
            });
        }

        Ok(())
    }
}

/// Last `max` bytes of a string, on a char boundary.
fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

/// Check if a quality tool is available.
pub fn check_tool(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::ToolNotFound(program.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vqe_models::{Asset, FrameRange, PixelFormat};

    #[test]
    fn test_for_asset_argument_shape() {
        let asset = Asset::new("/r/a.yuv", "/d/b.yuv", PixelFormat::Yuv420p, 1920, 1080);
        let cmd = ToolCommand::for_asset("psnr", &asset, "/tmp/psnr.log");
        assert_eq!(
            cmd.build_args(),
            vec!["yuv420p", "/r/a.yuv", "/d/b.yuv", "1920", "1080"]
        );
    }

    #[test]
    fn test_for_asset_appends_frame_range() {
        let asset = Asset::new("/r/a.yuv", "/d/b.yuv", PixelFormat::Yuv422p, 640, 480)
            .with_frame_range(FrameRange::new(0, 47));
        let cmd = ToolCommand::for_asset("signal_features", &asset, "/tmp/sig.log");
        assert_eq!(
            cmd.build_args(),
            vec!["yuv422p", "/r/a.yuv", "/d/b.yuv", "640", "480", "0", "47"]
        );
    }

    #[tokio::test]
    async fn test_run_captures_stdout_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("out.log");

        let cmd = ToolCommand::new("sh", &log_path)
            .arg("-c")
            .arg("printf 'psnr: 0 34.5\\npsnr: 1 35.0\\n'");
        ToolRunner::new().run(&cmd).await.unwrap();

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert_eq!(content, "psnr: 0 34.5\npsnr: 1 35.0\n");
    }

    #[tokio::test]
    async fn test_run_nonzero_exit_is_tool_failure() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("out.log");

        let cmd = ToolCommand::new("sh", &log_path)
            .arg("-c")
            .arg("echo boom >&2; exit 3");
        let err = ToolRunner::new().run(&cmd).await.unwrap_err();
        match err {
            MediaError::ToolFailed {
                tool,
                exit_code,
                stderr,
            } => {
                assert_eq!(tool, "sh");
                assert_eq!(exit_code, Some(3));
                assert!(stderr.unwrap().contains("boom"));
            }
            other => panic!("expected ToolFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_empty_output_is_missing_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("out.log");

        let cmd = ToolCommand::new("true", &log_path);
        let err = ToolRunner::new().run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::MissingLog { .. }));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found() {
        let cmd = ToolCommand::new("definitely-not-a-real-tool-xyz", "/tmp/x.log");
        let err = ToolRunner::new().run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_tool_dir_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let runner = ToolRunner::new().with_tool_dir(dir.path());
        let cmd = ToolCommand::new("psnr", dir.path().join("x.log"));
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::ToolNotFound(_)));
    }
}
