use std::io::Write;
use std::path::Path;

/// Append one outcome line to the restart log, creating parent
/// directories if absent. Lines are never rewritten or removed.
///
/// Format: `- <YYYY-MM-DD HH:MM:SS +ZZZZ> result=<ok|timeout> note=<text>`
pub fn append(path: &Path, result: &str, note: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S %z");
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "- {timestamp} result={result} note={note}")?;
    Ok(())
}
