//! External tool boundary.
//!
//! Every collaborator outside this process (pg_dump, pg_restore, the web
//! server command, the Azure CLI) is reached through here: spawn, await,
//! capture output, map exit status to a typed error.

use std::io::ErrorKind;
use tokio::process::Command;
use tracing::debug;

use crate::error::OpsError;

/// Captured output of a completed tool invocation.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Run an external tool to completion, extra environment applied to the child.
pub async fn run_tool(
    tool: &str,
    args: &[String],
    envs: &[(String, String)],
) -> Result<ToolOutput, OpsError> {
    debug!(tool, ?args, "running external tool");

    let mut cmd = Command::new(tool);
    cmd.args(args);
    for (key, value) in envs {
        cmd.env(key, value);
    }

    let output = cmd.output().await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => OpsError::ToolMissing(tool.to_string()),
        _ => OpsError::SpawnError {
            tool: tool.to_string(),
            source: e,
        },
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(OpsError::ToolFailed {
            tool: tool.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: stderr_tail(&stderr),
        });
    }

    Ok(ToolOutput { stdout, stderr })
}

/// Probe a tool's availability via `--version`, returning the first line.
pub async fn tool_version(tool: &str) -> Result<String, OpsError> {
    let output = run_tool(tool, &["--version".to_string()], &[]).await?;
    let line = output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();
    Ok(line)
}

/// Last portion of a stderr stream, bounded so error messages stay readable.
pub fn stderr_tail(stderr: &str) -> String {
    const MAX_LINES: usize = 20;
    const MAX_BYTES: usize = 2000;

    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines.len().saturating_sub(MAX_LINES);
    let mut tail = lines[start..].join("\n");
    if tail.len() > MAX_BYTES {
        let cut = tail.len() - MAX_BYTES;
        // Trim at a char boundary
        let boundary = tail
            .char_indices()
            .map(|(i, _)| i)
            .find(|&i| i >= cut)
            .unwrap_or(cut);
        tail = tail[boundary..].to_string();
    }
    tail.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_tail_short_input_untouched() {
        assert_eq!(stderr_tail("error: boom\n"), "error: boom");
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let input: String = (0..100).map(|i| format!("line {i}\n")).collect();
        let tail = stderr_tail(&input);
        assert!(tail.ends_with("line 99"));
        assert!(!tail.contains("line 0\n"));
        assert_eq!(tail.lines().count(), 20);
    }

    #[tokio::test]
    async fn test_missing_tool_maps_to_tool_missing() {
        let err = run_tool("definitely-not-a-real-tool-xyz", &[], &[])
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::ToolMissing(name) if name.contains("xyz")));
    }

    #[tokio::test]
    async fn test_version_probe_missing_tool() {
        let err = tool_version("definitely-not-a-real-tool-xyz")
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::ToolMissing(_)));
    }
}
