// ABOUTME: Environment variable parsing utilities
// ABOUTME: Typed readers with defaults, validation warnings and legacy fallbacks

use std::str::FromStr;
use std::time::Duration;

/// Parse an environment variable with validation
/// Returns the parsed value if it passes validation, otherwise returns the default
/// Logs warnings when environment variables are set but fail validation or parsing
pub fn parse_env_or_default_with_validation<T, F>(var_name: &str, default: T, validator: F) -> T
where
    T: FromStr + Copy + std::fmt::Display,
    F: Fn(T) -> bool,
{
    let raw_value = match std::env::var(var_name) {
        Ok(raw_value) => raw_value,
        // Not set: the default is the expected case, no warning
        Err(_) => return default,
    };

    match raw_value.trim().parse::<T>() {
        Ok(parsed_value) if validator(parsed_value) => parsed_value,
        Ok(_) => {
            tracing::warn!(
                "Environment variable {} has invalid value '{}', using default: {}",
                var_name,
                raw_value,
                default
            );
            default
        }
        Err(_) => {
            tracing::warn!(
                "Environment variable {} has unparseable value '{}', using default: {}",
                var_name,
                raw_value,
                default
            );
            default
        }
    }
}

/// Read a string variable with fallback to a legacy variable
/// Tries the primary variable first, then the fallback; blank values count as unset.
/// Parsing is left to the caller so invalid values can be reported instead of replaced.
pub fn env_string_with_fallback(primary_var: &str, fallback_var: &str) -> Option<String> {
    env_string(primary_var).or_else(|| env_string(fallback_var))
}

/// Read a string variable, treating unset and blank values alike
pub fn env_string_or_default(var_name: &str, default: &str) -> String {
    env_string(var_name).unwrap_or_else(|| default.to_string())
}

/// Read a string variable, returning `None` when it is unset or blank
pub fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a duration expressed in whole seconds; zero is rejected when `allow_zero` is false
pub fn parse_env_secs(var_name: &str, default: Duration, allow_zero: bool) -> Duration {
    let secs = parse_env_or_default_with_validation(var_name, default.as_secs(), |v| {
        allow_zero || v > 0
    });
    Duration::from_secs(secs)
}

/// Read a duration expressed in milliseconds; must be positive
pub fn parse_env_millis(var_name: &str, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    let millis = parse_env_or_default_with_validation(var_name, default_ms, |v| v > 0);
    Duration::from_millis(millis)
}
