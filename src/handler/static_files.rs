//! Static file serving module
//!
//! Serves the stylesheet, scripts and images below `/static/` and the
//! favicon, with `ETag` revalidation.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime};
use crate::logger;

/// URL prefix mapped onto the static directory
pub const STATIC_PREFIX: &str = "/static/";

const FAVICON_FILE: &str = "favicon.ico";
const ASSET_MAX_AGE: u32 = 3600;
const FAVICON_MAX_AGE: u32 = 86_400;

/// Serve a file below `/static/`
pub async fn serve_static(ctx: &RequestContext<'_>, static_dir: &str) -> Response<Full<Bytes>> {
    let relative = ctx.path.strip_prefix(STATIC_PREFIX).unwrap_or_default();
    match load_from_directory(static_dir, relative).await {
        Some((content, content_type)) => {
            build_static_file_response(content, content_type, ASSET_MAX_AGE, ctx)
        }
        None => http::build_404_response(),
    }
}

/// Serve the favicon from the static directory
pub async fn serve_favicon(ctx: &RequestContext<'_>, static_dir: &str) -> Response<Full<Bytes>> {
    match load_from_directory(static_dir, FAVICON_FILE).await {
        Some((content, content_type)) => {
            build_static_file_response(content, content_type, FAVICON_MAX_AGE, ctx)
        }
        None => http::build_404_response(),
    }
}

/// Load `relative_path` from `static_dir`, refusing anything that resolves outside it
pub async fn load_from_directory(
    static_dir: &str,
    relative_path: &str,
) -> Option<(Vec<u8>, &'static str)> {
    let file_path = resolve_in_directory(static_dir, relative_path)?;

    let content = match fs::read(&file_path).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {e}",
                file_path.display()
            ));
            return None;
        }
    };

    let content_type = mime::get_content_type(file_path.extension().and_then(|e| e.to_str()));
    Some((content, content_type))
}

fn resolve_in_directory(static_dir: &str, relative_path: &str) -> Option<PathBuf> {
    let relative_path = relative_path.trim_start_matches('/');
    if relative_path.is_empty() || relative_path.split('/').any(|seg| seg == "..") {
        return None;
    }

    let static_dir_canonical = match Path::new(static_dir).canonicalize() {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{static_dir}': {e}"
            ));
            return None;
        }
    };

    // File not found is common (404), no need to log
    let file_path = static_dir_canonical.join(relative_path).canonicalize().ok()?;
    if !file_path.starts_with(&static_dir_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {relative_path} -> {}",
            file_path.display()
        ));
        return None;
    }

    file_path.is_file().then_some(file_path)
}

fn build_static_file_response(
    data: Vec<u8>,
    content_type: &str,
    max_age: u32,
    ctx: &RequestContext<'_>,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(&data);

    if cache::check_etag_match(ctx.if_none_match.as_deref(), &etag) {
        return http::build_304_response(&etag);
    }

    http::response::build_cached_response(
        Bytes::from(data),
        content_type,
        &etag,
        max_age,
        ctx.is_head,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("css")).unwrap();
        std::fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
        std::fs::write(dir.path().join("favicon.ico"), [0u8, 0, 1, 0]).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_load_asset() {
        let dir = static_dir();
        let (content, content_type) = load_from_directory(dir.path().to_str().unwrap(), "css/site.css")
            .await
            .unwrap();
        assert_eq!(content, b"body{}");
        assert_eq!(content_type, "text/css; charset=utf-8");
    }

    #[tokio::test]
    async fn test_traversal_and_directories_rejected() {
        let dir = static_dir();
        let root = dir.path().to_str().unwrap();
        assert!(load_from_directory(root, "../etc/passwd").await.is_none());
        assert!(load_from_directory(root, "css/../../secret").await.is_none());
        assert!(load_from_directory(root, "css").await.is_none());
        assert!(load_from_directory(root, "").await.is_none());
        assert!(load_from_directory(root, "css/missing.css").await.is_none());
    }

    #[tokio::test]
    async fn test_etag_revalidation() {
        let dir = static_dir();
        let root = dir.path().to_str().unwrap();
        let etag = cache::generate_etag(b"body{}");

        let ctx = RequestContext {
            path: "/static/css/site.css",
            is_head: false,
            if_none_match: Some(etag),
        };
        assert_eq!(serve_static(&ctx, root).await.status(), 304);

        let ctx = RequestContext {
            path: "/static/css/site.css",
            is_head: false,
            if_none_match: None,
        };
        assert_eq!(serve_static(&ctx, root).await.status(), 200);
        assert_eq!(serve_favicon(&ctx, root).await.status(), 200);
    }
}
