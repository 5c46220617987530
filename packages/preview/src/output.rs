// ABOUTME: Captured output of the preview process
// ABOUTME: Bounded in-memory log buffer plus log-line classification and port detection

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::types::{LogType, PreviewLog};

/// Entries kept per process; older lines are dropped first
pub const MAX_LOG_ENTRIES: usize = 1000;

static PORT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)running on (?:local url:\s*)?https?://[^\s/]+:(\d+)", // Gradio, Flask
        r"(?i)uvicorn running on https?://[^\s/]+:(\d+)",
        r"(?i)serving http on \S+ port (\d+)", // python -m http.server
        r"(?i)listening on (?:https?://)?[^\s/]+:(\d+)",
        // Other startup announcements; client calls to local services must not match
        r"(?i)\b(?:running|serving|listening|started|available|launched)\b.*?https?://(?:localhost|127\.0\.0\.1|0\.0\.0\.0):(\d+)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

static HTTP_ACCESS_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        // ::1 - - [07/Sep/2025 12:25:39] "GET / HTTP/1.1" 200 -
        r#"^[:\w\.-]+ - - \[[^\]]+\] "[A-Z]+ [^"]+ HTTP/[\d\.]+" (\d{3})"#,
        // INFO:     127.0.0.1:52344 - "GET / HTTP/1.1" 200 OK
        r#"^INFO:\s+[\w\.:\[\]]+ - "[A-Z]+ [^"]+ HTTP/[\d\.]+" (\d{3})"#,
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Extract the port a server announces in one of its startup lines
pub fn extract_port_from_log(line: &str) -> Option<u16> {
    PORT_PATTERNS.iter().find_map(|regex| {
        regex
            .captures(line)
            .and_then(|captures| captures.get(1))
            .and_then(|port| port.as_str().parse::<u16>().ok())
    })
}

/// Check if a log line is a successful HTTP access log (not an error)
///
/// Many Python servers write access logs to stderr; those should not be
/// reported as failures.
pub fn is_successful_http_log(line: &str) -> bool {
    HTTP_ACCESS_PATTERNS.iter().any(|regex| {
        regex
            .captures(line)
            .and_then(|captures| captures.get(1))
            .and_then(|status| status.as_str().parse::<u16>().ok())
            .is_some_and(|status| (200..400).contains(&status))
    })
}

/// Ring buffer of captured lines, shared between the reader tasks and the supervisor
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    entries: Arc<RwLock<VecDeque<PreviewLog>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, log_type: LogType, message: String) {
        let mut entries = self.entries.write().await;
        entries.push_back(PreviewLog {
            timestamp: Utc::now(),
            log_type,
            message,
        });

        if entries.len() > MAX_LOG_ENTRIES {
            entries.pop_front();
        }
    }

    /// Entries newer than `since`, keeping the most recent `limit`
    pub async fn entries(
        &self,
        since: Option<DateTime<Utc>>,
        limit: Option<usize>,
    ) -> Vec<PreviewLog> {
        let entries = self.entries.read().await;
        let filtered: Vec<PreviewLog> = entries
            .iter()
            .filter(|log| since.map_or(true, |since| log.timestamp > since))
            .cloned()
            .collect();

        match limit {
            Some(max_count) if filtered.len() > max_count => {
                filtered[filtered.len() - max_count..].to_vec()
            }
            _ => filtered,
        }
    }

    /// Tail of stdout and stderr, formatted for an error message
    pub async fn summary(&self, max_lines: usize) -> String {
        let entries = self.entries.read().await;
        let tail = |wanted: LogType| -> String {
            let lines: Vec<&str> = entries
                .iter()
                .filter(|log| log.log_type == wanted)
                .map(|log| log.message.as_str())
                .collect();
            let start = lines.len().saturating_sub(max_lines);
            lines[start..].join("\n")
        };

        format!(
            "STDOUT:\n{}\nSTDERR:\n{}",
            tail(LogType::Stdout),
            tail(LogType::Stderr)
        )
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
