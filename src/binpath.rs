use std::path::{Path, PathBuf};

/// Resolve the openclaw binary.
///
/// Order: explicit configured path (must be an executable file), then a
/// PATH lookup, then the newest nvm-managed install. Returns `None` when
/// nothing resolves; the probe then falls back to HTTP and diagnostic
/// commands run verbatim.
pub fn find_openclaw(configured: &str) -> Option<PathBuf> {
    if !configured.is_empty() {
        let path = crate::config::expand_tilde(Path::new(configured));
        if is_executable(&path) {
            return Some(path);
        }
    }
    if let Some(path) = which("openclaw") {
        return Some(path);
    }
    newest_nvm_install()
}

/// Search PATH for an executable with the given name.
fn which(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// Glob `~/.nvm/versions/node/*/bin/openclaw` and take the newest version
/// (lexicographically last, matching the original sort-then-take-last).
fn newest_nvm_install() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    let pattern = Path::new(&home).join(".nvm/versions/node/*/bin/openclaw");
    let mut candidates: Vec<PathBuf> = glob::glob(pattern.to_str()?)
        .ok()?
        .filter_map(Result::ok)
        .collect();
    candidates.sort();
    candidates.pop()
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn make_executable(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[test]
    fn test_configured_executable_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let bin = make_executable(dir.path(), "openclaw");
        let resolved = find_openclaw(bin.to_str().unwrap());
        assert_eq!(resolved, Some(bin));
    }

    #[test]
    fn test_configured_non_executable_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("openclaw");
        std::fs::write(&plain, "not a binary").unwrap();
        // mode 0644: exists but not executable, so the configured path
        // must not be returned as-is.
        let resolved = find_openclaw(plain.to_str().unwrap());
        assert_ne!(resolved, Some(plain));
    }

    #[test]
    fn test_is_executable_rejects_directories() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_executable(dir.path()));
    }

    #[test]
    fn test_is_executable_missing_file() {
        assert!(!is_executable(Path::new("/nonexistent/openclaw")));
    }

    #[test]
    fn test_which_finds_binary_on_custom_path() {
        let dir = tempfile::tempdir().unwrap();
        let bin = make_executable(dir.path(), "restart-guard-test-probe");

        let original = std::env::var_os("PATH");
        std::env::set_var("PATH", dir.path());
        let found = which("restart-guard-test-probe");
        match original {
            Some(p) => std::env::set_var("PATH", p),
            None => std::env::remove_var("PATH"),
        }

        assert_eq!(found, Some(bin));
    }
}
