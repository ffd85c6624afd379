//! Static views the core renders itself: not-found, component failure, and
//! the start-up error page. Each carries a `data-view` marker so hosts and
//! tests can recognise it.

pub const NOT_FOUND_MARKER: &str = r#"data-view="not-found""#;
pub const ERROR_MARKER: &str = r#"data-view="route-error""#;
pub const STARTUP_ERROR_MARKER: &str = r#"data-view="startup-error""#;

/// Shown when neither the path nor the default route has a component.
pub fn not_found_view(path: &str) -> String {
    format!(
        r#"<section {marker} class="error-page">
  <h1>404</h1>
  <p>No page is registered for <code>{path}</code>.</p>
  <button data-action="home">Go home</button>
</section>"#,
        marker = NOT_FOUND_MARKER,
        path = escape(path),
    )
}

/// Shown when a component's render or init fails.
pub fn error_view(message: &str) -> String {
    format!(
        r#"<section {marker} class="error-page">
  <h1>Something went wrong</h1>
  <p class="error-message">{message}</p>
  <button data-action="retry">Retry</button>
  <button data-action="home">Go home</button>
</section>"#,
        marker = ERROR_MARKER,
        message = escape(message),
    )
}

/// Full-page view for fatal start-up failures. Bypasses the router.
pub fn startup_error_view(message: &str) -> String {
    format!(
        r#"<main {marker} class="startup-error">
  <h1>The application failed to start</h1>
  <pre>{message}</pre>
  <button data-action="reload">Reload</button>
</main>"#,
        marker = STARTUP_ERROR_MARKER,
        message = escape(message),
    )
}

/// Escape text for inclusion in markup.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
