// ABOUTME: HTML fragments handed to the UI layer
// ABOUTME: An iframe when the preview is healthy, an informative error panel otherwise

/// Escape text for use inside HTML element content or a double-quoted attribute
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub fn render_iframe(url: &str, height: &str) -> String {
    format!(
        r#"<iframe src="{}" width="100%" height="{}" style="border: 0;"></iframe>"#,
        escape_html(url),
        escape_html(height)
    )
}

/// Panel shown instead of the iframe; `message` is usually a supervisor outcome
pub fn render_error_panel(message: &str) -> String {
    format!(
        r#"<div class="likable-preview-error" style="color: #d32f2f; padding: 20px; text-align: center; border: 1px solid #d32f2f; border-radius: 8px; background: #ffebee;">
    <h3>Preview App Temporarily Unavailable</h3>
    <p><strong>Status:</strong></p>
    <pre style="text-align: left; white-space: pre-wrap;">{}</pre>
    <p>The preview app may still be starting up. Please wait a few seconds and try refreshing.</p>
    <button onclick="location.reload()" style="background: #1976d2; color: white; border: none; padding: 8px 16px; border-radius: 4px; cursor: pointer;">Refresh Preview</button>
</div>"#,
        escape_html(message)
    )
}
