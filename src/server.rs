//! Local preview server for the output directory.

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use anyhow::Context as _;
use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    middleware,
    response::{Html, IntoResponse, Response},
    Router,
};
use log::{debug, info, warn};
use percent_encoding::percent_decode_str;
use tokio::net::TcpListener;

use crate::plugins::Plugin;

#[derive(Clone)]
struct ServerState {
    dist_dir: Arc<PathBuf>,
    plugins: Arc<Vec<Box<dyn Plugin>>>,
}

pub fn build_router(dist_dir: PathBuf, plugins: Vec<Box<dyn Plugin>>) -> Router {
    let mut router = Router::new();
    for plugin in &plugins {
        if let Some(routes) = plugin.routes() {
            debug!("plugin {} adds routes", plugin.name());
            router = router.merge(routes);
        }
    }

    let state = ServerState {
        dist_dir: Arc::new(dist_dir),
        plugins: Arc::new(plugins),
    };

    router
        .fallback(move |uri: Uri| {
            let state = state.clone();
            async move { serve_file(state, uri).await }
        })
        .layer(middleware::map_response(no_cache))
}

/// Serves `dist_dir` on `0.0.0.0:port` until Ctrl-C.
pub async fn serve(dist_dir: PathBuf, port: u16, plugins: Vec<Box<dyn Plugin>>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to listen on port {port}"))?;

    info!(
        "serving {} at http://localhost:{}",
        dist_dir.display(),
        port
    );

    axum::serve(listener, build_router(dist_dir, plugins))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn serve_file(state: ServerState, uri: Uri) -> Response {
    let Some(decoded) = decode_path(uri.path()) else {
        debug!("404 {} (not utf-8)", uri.path());
        return not_found(uri.path());
    };
    let request_path = decoded.as_str();

    for plugin in state.plugins.iter() {
        if let Some(response) = plugin.handle_request(request_path) {
            debug!("{request_path} answered by plugin {}", plugin.name());
            return response;
        }
    }

    let Some(file) = resolve_path(&state.dist_dir, request_path) else {
        debug!("404 {request_path}");
        return not_found(request_path);
    };

    let body = match tokio::fs::read(&file).await {
        Ok(body) => body,
        Err(e) => {
            warn!("failed to read {}: {}", file.display(), e);
            return not_found(request_path);
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type(&file)),
    );
    for plugin in state.plugins.iter() {
        plugin.middleware(request_path, &mut headers);
    }

    (headers, body).into_response()
}

/// `/getting%20started.html` -> `/getting started.html`.
fn decode_path(raw: &str) -> Option<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|path| path.into_owned())
}

/// Maps a decoded request path onto a file in `dist_dir`: `/` and directories serve
/// their `index.html`, extension-less paths get `.html`. Paths with `..`
/// never resolve.
pub fn resolve_path(dist_dir: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));

    let mut path = dist_dir.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => path.push(segment),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if path.is_dir() {
        path.push("index.html");
    } else if path.extension().is_none() {
        path.set_extension("html");
    }

    path.is_file().then_some(path)
}

fn content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" | "md" => "text/plain; charset=utf-8",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

fn not_found(request_path: &str) -> Response {
    let page = format!(
        "<!DOCTYPE html><html><head><title>404 Not Found</title></head>\
         <body><h1>404 Not Found</h1><p>{} does not exist.</p></body></html>",
        html_escape::encode_text(request_path)
    );
    (StatusCode::NOT_FOUND, Html(page)).into_response()
}

async fn no_cache(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}
