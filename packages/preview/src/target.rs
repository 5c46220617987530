// ABOUTME: Target script lookup inside the sandbox directory
// ABOUTME: Exactly one match is required; several matches fail closed instead of picking one

use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::types::{PreviewError, PreviewResult};
use crate::validation::validate_target_name;

/// Find the single `file_name` under `sandbox`.
///
/// Symlinks are not followed, so the search cannot leave the sandbox.
///
/// # Errors
///
/// * `PreviewError::InvalidTargetName` - `file_name` is not a plain file name
/// * `PreviewError::TargetNotFound` - the sandbox is missing or holds no match
/// * `PreviewError::AmbiguousTarget` - more than one match; every candidate is listed
pub fn find_target(sandbox: &Path, file_name: &str) -> PreviewResult<PathBuf> {
    validate_target_name(file_name)?;

    let not_found = || PreviewError::TargetNotFound {
        sandbox: sandbox.to_path_buf(),
        file_name: file_name.to_string(),
    };

    if !sandbox.is_dir() {
        debug!("Sandbox directory {} does not exist", sandbox.display());
        return Err(not_found());
    }

    let mut candidates: Vec<PathBuf> = WalkDir::new(sandbox)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable sandbox entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == file_name)
        .map(|entry| entry.into_path())
        .collect();

    match candidates.len() {
        0 => Err(not_found()),
        1 => Ok(candidates.remove(0)),
        _ => {
            candidates.sort();
            error!(
                "Found {} candidate {} files in {}; refusing to guess",
                candidates.len(),
                file_name,
                sandbox.display()
            );
            Err(PreviewError::AmbiguousTarget {
                file_name: file_name.to_string(),
                candidates,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "import gradio as gr\n").unwrap();
    }

    #[test]
    fn test_missing_sandbox_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = find_target(&dir.path().join("sandbox"), "app.py").unwrap_err();
        assert!(matches!(err, PreviewError::TargetNotFound { .. }));
    }

    #[test]
    fn test_empty_sandbox_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = find_target(dir.path(), "app.py").unwrap_err();
        assert!(err.to_string().starts_with("No app.py found"));
    }

    #[test]
    fn test_finds_nested_target() {
        let dir = TempDir::new().unwrap();
        let expected = dir.path().join("projects").join("todo").join("app.py");
        touch(&expected);
        touch(&dir.path().join("projects").join("todo").join("utils.py"));

        assert_eq!(find_target(dir.path(), "app.py").unwrap(), expected);
    }

    #[test]
    fn test_directory_with_target_name_is_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("app.py")).unwrap();
        let err = find_target(dir.path(), "app.py").unwrap_err();
        assert!(matches!(err, PreviewError::TargetNotFound { .. }));
    }

    #[test]
    fn test_multiple_targets_fail_closed() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("a").join("app.py");
        let second = dir.path().join("b").join("app.py");
        touch(&second);
        touch(&first);

        match find_target(dir.path(), "app.py") {
            Err(PreviewError::AmbiguousTarget { candidates, .. }) => {
                assert_eq!(candidates, vec![first, second]);
            }
            other => panic!("expected AmbiguousTarget, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_target_name_rejected() {
        let dir = TempDir::new().unwrap();
        let err = find_target(dir.path(), "../app.py").unwrap_err();
        assert!(matches!(err, PreviewError::InvalidTargetName { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_are_not_followed() {
        let outside = TempDir::new().unwrap();
        touch(&outside.path().join("app.py"));

        let sandbox = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), sandbox.path().join("linked")).unwrap();

        let err = find_target(sandbox.path(), "app.py").unwrap_err();
        assert!(matches!(err, PreviewError::TargetNotFound { .. }));
    }
}
