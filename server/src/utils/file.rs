//! File path helpers

use std::path::PathBuf;

/// Expand a path string to an absolute path.
///
/// Handles `~` / `~/path` (home directory) and makes relative paths
/// absolute against the current working directory. Absolute paths are
/// returned unchanged.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();

    if path.is_empty() {
        return std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    let expanded = if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from(path))
    } else if let Some(rest) = path.strip_prefix("~/") {
        match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        }
    } else {
        PathBuf::from(path)
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_path_absolute() {
        assert_eq!(expand_path("/var/lib/apmtrack"), PathBuf::from("/var/lib/apmtrack"));
    }

    #[test]
    fn test_expand_path_relative() {
        let result = expand_path("./data");
        assert!(result.is_absolute());
        assert!(result.ends_with("data"));
    }

    #[test]
    fn test_expand_path_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~"), home);
            assert_eq!(expand_path("~/.apmtrack"), home.join(".apmtrack"));
        }
    }

    #[test]
    fn test_expand_path_empty_is_cwd() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(expand_path("  "), cwd);
    }
}
