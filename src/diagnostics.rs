use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// Per-command deadline for diagnostic commands.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const OPENCLAW_PREFIX: &str = "openclaw ";

/// Run each diagnostic command and aggregate the captured output.
///
/// Commands run through `sh -c`. A command that times out or fails to
/// spawn contributes an inline `[error: ...]` block; the batch always
/// completes. The result is byte-deterministic for a fixed command set
/// against a deterministic environment: `$ <cmd>\n<output>` blocks
/// joined by blank lines.
pub async fn collect(oc_bin: Option<&Path>, commands: &[String]) -> String {
    let mut sections = Vec::with_capacity(commands.len());
    for command in commands {
        let resolved = resolve_command(oc_bin, command);
        let body = run_one(&resolved, COMMAND_TIMEOUT).await;
        sections.push(format!("$ {resolved}\n{body}"));
    }
    sections.join("\n\n")
}

/// Rewrite a leading `openclaw ` token to the resolved binary path.
fn resolve_command(oc_bin: Option<&Path>, command: &str) -> String {
    match oc_bin {
        Some(bin) if command.starts_with(OPENCLAW_PREFIX) => format!(
            "{} {}",
            bin.display(),
            &command[OPENCLAW_PREFIX.len()..]
        ),
        _ => command.to_string(),
    }
}

async fn run_one(command: &str, deadline: Duration) -> String {
    let output = tokio::time::timeout(
        deadline,
        Command::new("sh")
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match output {
        Ok(Ok(output)) => {
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            if !stdout.is_empty() {
                stdout
            } else {
                String::from_utf8_lossy(&output.stderr).trim().to_string()
            }
        }
        Ok(Err(e)) => format!("[error: {e}]"),
        Err(_) => format!("[error: timed out after {deadline:?}]"),
    }
}
