// ABOUTME: Validation utilities for the preview target lookup
// ABOUTME: Keeps the configured script name a plain file name inside the sandbox

use crate::types::{PreviewError, PreviewResult};

/// Validates the file name the supervisor searches the sandbox for
///
/// Checks that the name:
/// - Is not empty
/// - Does not contain path traversal sequences (..)
/// - Does not contain path separators (/ or \)
/// - Does not contain NUL bytes or control characters
///
/// # Examples
///
/// ```
/// use likable_preview::validation::validate_target_name;
///
/// assert!(validate_target_name("app.py").is_ok());
/// assert!(validate_target_name("").is_err());
/// assert!(validate_target_name("../app.py").is_err());
/// ```
pub fn validate_target_name(name: &str) -> PreviewResult<()> {
    let invalid = |reason: &str| PreviewError::InvalidTargetName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("target name cannot be empty"));
    }

    if name.contains("..") {
        return Err(invalid("contains path traversal sequence"));
    }

    // Both Unix and Windows separators
    if name.contains('/') || name.contains('\\') {
        return Err(invalid("contains path separator"));
    }

    if name.contains('\0') {
        return Err(invalid("contains null byte"));
    }

    // Newlines would also let a name forge log lines
    if name.chars().any(|c| c.is_control()) {
        return Err(invalid("contains control characters"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_target_names() {
        assert!(validate_target_name("app.py").is_ok());
        assert!(validate_target_name("main_app.py").is_ok());
        assert!(validate_target_name("server").is_ok());
    }

    #[test]
    fn test_empty_target_name() {
        assert!(validate_target_name("").is_err());
    }

    #[test]
    fn test_path_traversal() {
        assert!(validate_target_name("..").is_err());
        assert!(validate_target_name("../app.py").is_err());
        assert!(validate_target_name("app..py").is_err());
    }

    #[test]
    fn test_path_separators() {
        assert!(validate_target_name("/etc/passwd").is_err());
        assert!(validate_target_name("sub\\app.py").is_err());
        assert!(validate_target_name("sub/app.py").is_err());
    }

    #[test]
    fn test_null_and_control_characters() {
        assert!(validate_target_name("app\0.py").is_err());
        assert!(validate_target_name("app\n.py").is_err());
        assert!(validate_target_name("app\t.py").is_err());
    }

    #[test]
    fn test_error_carries_reason() {
        let err = validate_target_name("a/b").unwrap_err();
        assert!(err.to_string().contains("path separator"));
    }
}
