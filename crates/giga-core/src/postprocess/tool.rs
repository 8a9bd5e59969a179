//! External remux tool invocation.

use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Runs the external remuxer with `args` and returns its exit status.
pub trait RemuxTool: Send + Sync {
    fn execute(&self, args: &[String]) -> io::Result<i32>;
}

/// `ffmpeg` (or a compatible program) on the local machine.
#[derive(Debug, Clone)]
pub struct FfmpegTool {
    program: PathBuf,
}

impl FfmpegTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        FfmpegTool {
            program: program.into(),
        }
    }
}

impl Default for FfmpegTool {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl RemuxTool for FfmpegTool {
    fn execute(&self, args: &[String]) -> io::Result<i32> {
        tracing::debug!(program = %self.program.display(), ?args, "running remux tool");
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;
        let code = output.status.code().unwrap_or(-1);
        if code != 0 {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("");
            tracing::warn!(code, "remux tool failed: {}", tail);
        }
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn reports_exit_status() {
        let ok = FfmpegTool::new("true");
        assert_eq!(ok.execute(&[]).unwrap(), 0);
        let fail = FfmpegTool::new("false");
        assert_ne!(fail.execute(&[]).unwrap(), 0);
    }

    #[test]
    fn missing_program_is_a_launch_error() {
        let tool = FfmpegTool::new("/nonexistent/giga-remux-tool");
        assert!(tool.execute(&["-version".to_string()]).is_err());
    }
}
