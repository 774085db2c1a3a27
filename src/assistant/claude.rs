//! Claude CLI invoker

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use tokio::process::Command;

use super::{Assistant, AssistantError, AssistantRequest};

/// Resolve the assistant binary on `PATH`
pub fn locate_binary(binary: &str) -> Result<PathBuf, AssistantError> {
    which::which(binary).map_err(|_| AssistantError::NotFound {
        binary: binary.to_string(),
    })
}

/// Extract the `result` field from the assistant's JSON output
pub fn parse_output(stdout: &str, stderr: &str) -> Result<String, AssistantError> {
    let raw = stdout.trim();
    if raw.is_empty() {
        return Err(AssistantError::EmptyOutput {
            stderr: stderr.trim().to_string(),
        });
    }

    let data: Value = serde_json::from_str(raw).map_err(|_| AssistantError::malformed(raw))?;
    let Value::Object(map) = data else {
        return Err(AssistantError::malformed(raw));
    };

    Ok(match map.get("result") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    })
}

/// Runs `claude -p <prompt> --output-format json` as a child process
#[derive(Debug, Clone)]
pub struct ClaudeCli {
    binary: String,
    timeout: Duration,
    skip_permissions: bool,
    working_dir: Option<PathBuf>,
}

impl ClaudeCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
            skip_permissions: false,
            working_dir: None,
        }
    }

    /// Pass `--dangerously-skip-permissions`
    pub fn skip_permissions(mut self, skip: bool) -> Self {
        self.skip_permissions = skip;
        self
    }

    pub fn working_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.working_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Command-line arguments for one request
    pub fn args(&self, request: &AssistantRequest) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            request.prompt.clone(),
            "--output-format".to_string(),
            "json".to_string(),
            "--allowedTools".to_string(),
            request.tools.clone(),
            "--max-turns".to_string(),
            request.max_turns.to_string(),
        ];
        if self.skip_permissions {
            args.push("--dangerously-skip-permissions".to_string());
        }
        args
    }
}

#[async_trait]
impl Assistant for ClaudeCli {
    async fn invoke(&self, request: &AssistantRequest) -> Result<String, AssistantError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!(
            "Invoking {} (max_turns={}, prompt {} chars)",
            self.binary,
            request.max_turns,
            request.prompt.len()
        );

        let child = cmd.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => AssistantError::NotFound {
                binary: self.binary.clone(),
            },
            _ => AssistantError::Spawn(e),
        })?;

        // Dropping the future on timeout kills the child
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(AssistantError::Spawn)?,
            Err(_) => {
                warn!("{} did not finish within {}s", self.binary, self.timeout.as_secs());
                return Err(AssistantError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            debug!("{} exited with {:?}", self.binary, output.status.code());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        parse_output(&stdout, &stderr)
    }
}
