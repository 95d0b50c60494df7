//! Python code execution tool.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;

use super::{required_str, truncate_output, Tool, ToolError};

const MAX_OUTPUT: usize = 10_000;

/// Run a Python snippet in the task-data directory.
pub struct RunPython {
    interpreter: String,
    default_timeout_secs: u64,
}

impl RunPython {
    pub fn new(default_timeout_secs: u64) -> Self {
        Self {
            interpreter: "python3".to_string(),
            default_timeout_secs,
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }
}

#[async_trait]
impl Tool for RunPython {
    fn name(&self) -> &str {
        "run_python"
    }

    fn description(&self) -> &str {
        "Execute Python 3 code and return its exit code, stdout and stderr. Print the values you need. Attached files are in the working directory."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Python source to execute"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": format!(
                        "Timeout in seconds (default: {})",
                        self.default_timeout_secs
                    )
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> Result<String, ToolError> {
        let code = required_str(&args, "code")?;
        let timeout_secs = args["timeout_secs"]
            .as_u64()
            .unwrap_or(self.default_timeout_secs);

        tracing::info!("Executing python snippet ({} bytes)", code.len());

        let mut command = Command::new(&self.interpreter);
        command
            .arg("-c")
            .arg(code)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if workspace.is_dir() {
            command.current_dir(workspace);
        }

        let output = tokio::time::timeout(
            std::time::Duration::from_secs(timeout_secs),
            command.output(),
        )
        .await
        .map_err(|_| ToolError::Timeout(timeout_secs))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        let mut result = format!("Exit code: {}\n", exit_code);

        if !stdout.is_empty() {
            result.push_str("\n--- stdout ---\n");
            result.push_str(&stdout);
        }

        if !stderr.is_empty() {
            result.push_str("\n--- stderr ---\n");
            result.push_str(&stderr);
        }

        Ok(truncate_output(result, MAX_OUTPUT))
    }
}
