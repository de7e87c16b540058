//! The single rendered page: map shell with the provider token injected.

use std::path::Path;

use axum::extract::State;
use axum::response::Html;
use axum::routing::get;
use axum::Router;

use crate::AppState;

/// Placeholder in `index.html` replaced by the token as a JS string literal.
const TOKEN_PLACEHOLDER: &str = "{{ mapbox_token }}";

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.index.body().to_string())
}

/// `index.html`, rendered once at startup.
#[derive(Debug, Clone)]
pub struct IndexPage {
    body: String,
}

impl IndexPage {
    /// Read `index.html` from `template_dir` and inject `token`.
    pub fn load(template_dir: &Path, token: &str) -> std::io::Result<Self> {
        let template = std::fs::read_to_string(template_dir.join("index.html"))?;
        Ok(Self::render(&template, token))
    }

    pub fn render(template: &str, token: &str) -> Self {
        // A JSON string literal is also a valid, escaped JS string literal.
        let literal = serde_json::Value::String(token.to_string()).to_string();
        Self {
            body: template.replace(TOKEN_PLACEHOLDER, &literal),
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}
