use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::{Plugin, PluginContext};
use crate::sidebar::SidebarConfig;

/// Stricter response headers, and no serving of dotfiles.
#[derive(Default)]
pub struct SecurityHeadersPlugin;

impl SecurityHeadersPlugin {
    pub const NAME: &'static str = "security-headers";
}

impl Plugin for SecurityHeadersPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn middleware(&self, _path: &str, headers: &mut HeaderMap) {
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
    }

    fn handle_request(&self, path: &str) -> Option<Response> {
        let hidden = path.split('/').any(|segment| segment.starts_with('.'));
        hidden.then(|| (StatusCode::FORBIDDEN, "Forbidden").into_response())
    }
}

/// Serves the sidebar as JSON at `/api/menu`.
#[derive(Default)]
pub struct MenuPlugin {
    sidebar: SidebarConfig,
}

impl MenuPlugin {
    pub const NAME: &'static str = "menu";
}

impl Plugin for MenuPlugin {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn init(&mut self, context: &PluginContext) -> anyhow::Result<()> {
        self.sidebar = context.sidebar.clone();
        Ok(())
    }

    fn routes(&self) -> Option<Router> {
        let sidebar = self.sidebar.clone();
        Some(Router::new().route(
            "/api/menu",
            get(move || {
                let sidebar = sidebar.clone();
                async move { Json(sidebar) }
            }),
        ))
    }
}
