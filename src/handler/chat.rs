//! `POST /chat` adapter: reads the bounded request body and hands it to the relay

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{HeaderMap, Request, Response};

use crate::chat::{ChatError, ChatReply};
use crate::config::AppState;
use crate::http;
use crate::logger;

/// Relay one chat request and encode the reply as JSON
pub async fn handle_chat<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let max_body_size = state.config.http.max_body_size;
    if exceeds_declared_length(req.headers(), max_body_size) {
        return http::build_413_response();
    }
    if !has_json_content_type(req.headers()) {
        let err = ChatError::Upstream(format!(
            "unsupported request content type: {:?}",
            req.headers().get(CONTENT_TYPE)
        ));
        logger::log_error(&format!("Chat error: {err}"));
        return reply_response(&ChatReply::from_error(&err), state);
    }

    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    let body = match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.is::<LengthLimitError>() => {
            logger::log_error(&format!(
                "Request body too large (max: {max_body_size} bytes)"
            ));
            return http::build_413_response();
        }
        Err(e) => {
            let err = ChatError::Upstream(format!("failed to read request body: {e}"));
            logger::log_error(&format!("Chat error: {err}"));
            return reply_response(&ChatReply::from_error(&err), state);
        }
    };

    let reply = state.relay.handle_chat(&body).await;
    reply_response(&reply, state)
}

fn reply_response(reply: &ChatReply, state: &AppState) -> Response<Full<Bytes>> {
    http::build_json_response(reply.status, &reply.envelope, state.config.http.enable_cors)
}

/// Accept `application/json` and `application/*+json`, ignoring parameters
fn has_json_content_type(headers: &HeaderMap) -> bool {
    let Some(mime) = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
    else {
        return false;
    };
    let mime = mime.trim().to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Validate Content-Length header against the body limit
fn exceeds_declared_length(headers: &HeaderMap, max_body_size: u64) -> bool {
    let Some(content_length) = headers.get(CONTENT_LENGTH) else {
        return false;
    };
    match content_length.to_str().ok().and_then(|s| s.parse::<u64>().ok()) {
        Some(size) if size > max_body_size => {
            logger::log_error(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            true
        }
        Some(_) => false,
        None => {
            logger::log_warning("Invalid Content-Length value, skipping size check");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_length() {
        let mut headers = HeaderMap::new();
        assert!(!exceeds_declared_length(&headers, 10));

        headers.insert(CONTENT_LENGTH, "10".parse().unwrap());
        assert!(!exceeds_declared_length(&headers, 10));

        headers.insert(CONTENT_LENGTH, "11".parse().unwrap());
        assert!(exceeds_declared_length(&headers, 10));

        headers.insert(CONTENT_LENGTH, "eleven".parse().unwrap());
        assert!(!exceeds_declared_length(&headers, 10));
    }

    #[test]
    fn test_json_content_type() {
        let mut headers = HeaderMap::new();
        assert!(!has_json_content_type(&headers));

        for accepted in [
            "application/json",
            "application/json; charset=utf-8",
            "Application/JSON",
            "application/merge-patch+json",
        ] {
            headers.insert(CONTENT_TYPE, accepted.parse().unwrap());
            assert!(has_json_content_type(&headers), "{accepted}");
        }

        for rejected in ["text/plain", "application/x-www-form-urlencoded", "text/json"] {
            headers.insert(CONTENT_TYPE, rejected.parse().unwrap());
            assert!(!has_json_content_type(&headers), "{rejected}");
        }
    }
}
