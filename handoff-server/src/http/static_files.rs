//! Embedded capture page assets and page rendering

use axum::{
    body::Body,
    extract::Path,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use handoff_core::{CaptureOptions, SessionId};
use rust_embed::RustEmbed;
use serde::Serialize;

/// Capture page assets (compiled into binary)
#[derive(RustEmbed)]
#[folder = "assets/"]
struct CaptureAssets;

/// Values the client script reads from the page
#[derive(Serialize)]
struct PageConfig<'a> {
    session_id: &'a str,
    providers: &'a [String],
    plans: &'a [String],
    max_photo_bytes: usize,
}

/// Handler for `GET /assets/*path`
pub async fn asset_handler(Path(path): Path<String>) -> impl IntoResponse {
    serve_file(&path)
        .unwrap_or_else(|| (StatusCode::NOT_FOUND, "Asset not found").into_response())
}

/// Serve a file from embedded assets
fn serve_file(path: &str) -> Option<Response<Body>> {
    // Templates are rendered, never served raw
    if path.ends_with(".html") {
        return None;
    }
    let file = CaptureAssets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .body(Body::from(file.data.into_owned()))
        .ok()
}

fn template(name: &str) -> String {
    CaptureAssets::get(name)
        .map(|file| String::from_utf8_lossy(&file.data).into_owned())
        .unwrap_or_default()
}

/// Escape text for use in HTML element content
fn escape_html(text: &str) -> String {
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

/// Render the interactive flow for a session
pub fn render_capture_page(id: &SessionId, options: &CaptureOptions) -> String {
    let config = PageConfig {
        session_id: id.as_str(),
        providers: &options.providers,
        plans: &options.plans,
        max_photo_bytes: options.max_photo_bytes,
    };
    let config_json = serde_json::to_string(&config)
        .unwrap_or_else(|_| "{}".to_string())
        .replace('<', "\\u003c");

    template("capture.html")
        .replace("{{TITLE}}", &escape_html(&options.title))
        .replace("{{PURPOSE}}", &escape_html(&options.purpose))
        .replace("{{CONFIG_JSON}}", &config_json)
}

/// Render a page that only shows a message
pub fn render_status_page(heading: &str, message: &str) -> String {
    template("status.html")
        .replace("{{HEADING}}", &escape_html(heading))
        .replace("{{MESSAGE}}", &escape_html(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_page_embeds_session_and_escapes_text() {
        let id = SessionId::generate();
        let options = CaptureOptions {
            title: "Sign <up>".to_string(),
            ..CaptureOptions::default()
        };
        let page = render_capture_page(&id, &options);

        assert!(page.contains(id.as_str()));
        assert!(page.contains("Sign &lt;up&gt;"));
        assert!(!page.contains("{{"));
        assert!(page.contains("I agree"));
    }

    #[test]
    fn config_json_cannot_close_script_tag() {
        let id = SessionId::generate();
        let options = CaptureOptions {
            providers: vec!["</script><b>".to_string()],
            ..CaptureOptions::default()
        };
        let page = render_capture_page(&id, &options);
        assert!(!page.contains("</script><b>"));
    }

    #[test]
    fn status_page_renders_message() {
        let page = render_status_page("Link expired", "Ask for a new link.");
        assert!(page.contains("<h1>Link expired</h1>"));
        assert!(page.contains("Ask for a new link."));
    }

    #[test]
    fn templates_are_not_served_raw() {
        assert!(serve_file("capture.html").is_none());
        assert!(serve_file("capture.js").is_some());
        assert!(serve_file("missing.css").is_none());
    }
}
