use tokio::process::Command;

use crate::Error;

/// Run `command` to completion and return its stdout.
pub(crate) async fn run(tool: &'static str, command: &mut Command) -> Result<String, Error> {
    tracing::debug!(tool, ?command, "Running");

    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| Error::Spawn { tool, source })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::error!(tool, status = %output.status, %stderr, "Command failed");
        return Err(Error::Failed {
            tool,
            status: output.status,
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
