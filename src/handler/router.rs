//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route lookup, method
//! validation, dispatch and access logging.

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, IF_NONE_MATCH, SERVER};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::config::AppState;
use crate::handler::pages::{self, Page};
use crate::handler::{chat, static_files};
use crate::http;
use crate::logger::{self, AccessLogEntry};

const HEALTH_PATH: &str = "/healthz";
const CHAT_PATH: &str = "/chat";
const FAVICON_PATH: &str = "/favicon.ico";

const READ_METHODS: &str = "GET, HEAD, OPTIONS";
const CHAT_METHODS: &str = "POST, OPTIONS";

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

/// Resolved target of a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Chat,
    Read(Resource),
}

/// Targets answering `GET`/`HEAD`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource {
    Health,
    Page(Page),
    Favicon,
    Static,
}

impl Route {
    fn resolve(path: &str) -> Option<Self> {
        let resource = match path {
            CHAT_PATH => return Some(Self::Chat),
            HEALTH_PATH => Resource::Health,
            FAVICON_PATH => Resource::Favicon,
            p if p.starts_with(static_files::STATIC_PREFIX) => Resource::Static,
            p => Resource::Page(Page::from_path(p)?),
        };
        Some(Self::Read(resource))
    }

    const fn allowed_methods(self) -> &'static str {
        match self {
            Self::Chat => CHAT_METHODS,
            Self::Read(_) => READ_METHODS,
        }
    }

    fn allows(self, method: &Method) -> bool {
        match self {
            Self::Chat => *method == Method::POST,
            Self::Read(_) => *method == Method::GET || *method == Method::HEAD,
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let started = Instant::now();
    let access_entry = state.config.logging.access_log.then(|| {
        AccessLogEntry::start(
            peer_addr,
            req.method(),
            req.uri(),
            req.version(),
            req.headers(),
        )
    });

    let mut response = route_request(req, &state).await;
    if let Ok(server_name) = HeaderValue::from_str(&state.config.http.server_name) {
        response.headers_mut().insert(SERVER, server_name);
    }

    if let Some(mut entry) = access_entry {
        let body_bytes = response.body().size_hint().exact().unwrap_or(0);
        entry.finish(
            response.status().as_u16(),
            usize::try_from(body_bytes).unwrap_or(usize::MAX),
            started,
        );
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Route request based on path and method
async fn route_request<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let Some(route) = Route::resolve(req.uri().path()) else {
        return http::build_404_response();
    };

    let method = req.method().clone();
    if method == Method::OPTIONS {
        return http::build_options_response(
            route.allowed_methods(),
            state.config.http.enable_cors,
        );
    }
    if !route.allows(&method) {
        logger::log_warning(&format!(
            "Method not allowed: {method} {}",
            req.uri().path()
        ));
        return http::build_405_response(route.allowed_methods());
    }

    let resource = match route {
        Route::Chat => return chat::handle_chat(req, state).await,
        Route::Read(resource) => resource,
    };

    let ctx = RequestContext {
        path: req.uri().path(),
        is_head: method == Method::HEAD,
        if_none_match: req
            .headers()
            .get(IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
    };
    let pages_config = &state.config.pages;

    match resource {
        Resource::Health => http::build_health_response(),
        Resource::Page(page) => pages::serve_page(&ctx, &pages_config.templates_dir, page).await,
        Resource::Favicon => static_files::serve_favicon(&ctx, &pages_config.static_dir).await,
        Resource::Static => static_files::serve_static(&ctx, &pages_config.static_dir).await,
    }
}
