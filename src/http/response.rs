//! HTTP response building module
//!
//! Provides the response draft the engine fills in and builders for the fixed responses
//! (error pages, redirects, 416), decoupled from specific business logic.

use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::body::Bytes;
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use maud::{html, DOCTYPE};
use std::convert::Infallible;
use std::io;

/// Body type of every response the engine produces
pub type ResponseBody = BoxBody<Bytes, io::Error>;

fn never(e: Infallible) -> io::Error {
    match e {}
}

/// Empty response body
pub fn empty_body() -> ResponseBody {
    Empty::new().map_err(never).boxed()
}

/// Response body with the given content
pub fn full_body(data: impl Into<Bytes>) -> ResponseBody {
    Full::new(data.into()).map_err(never).boxed()
}

/// A response under construction: status and headers, not yet sent
#[derive(Debug, Clone)]
pub struct ResponseDraft {
    pub status: StatusCode,
    pub headers: HeaderMap,
    headers_sent: bool,
}

impl Default for ResponseDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseDraft {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            headers_sent: false,
        }
    }

    /// Set a header unless it is already present. Returns whether the value was added.
    pub fn set_default(&mut self, name: HeaderName, value: &str) -> bool {
        if self.headers.contains_key(&name) {
            return false;
        }
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
                true
            }
            Err(e) => {
                log::warn!("Skipping invalid {name} header value {value:?}: {e}");
                false
            }
        }
    }

    pub const fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    /// Mark the headers as written to the client, the draft can no longer be used for a transfer
    pub fn mark_sent(&mut self) {
        self.headers_sent = true;
    }

    /// Finish the draft with the given body
    pub fn into_response(self, body: ResponseBody) -> Response<ResponseBody> {
        let mut response = Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Produces the text of a standard response page for the given status code.
pub fn error_page_text(status: StatusCode) -> String {
    let status_str = status.as_str();
    let reason = status.canonical_reason().unwrap_or("");
    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (status_str) " " (reason) }
            }
            body {
                h1 { (status_str) " " (reason) }
            }
        }
    }
    .into()
}

/// Build generic HTML error page response
pub fn build_error_response(status: StatusCode, is_head: bool) -> Response<ResponseBody> {
    build_page_response(status, error_page_text(status), "text/html; charset=utf-8", is_head)
}

/// Build 301 redirect response with a minimal HTML body linking to the target
pub fn build_redirect_response(location: &str, is_head: bool) -> Response<ResponseBody> {
    let text: String = html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { "Redirecting" }
            }
            body {
                pre { "Redirecting to " a href=(location) { (location) } }
            }
        }
    }
    .into();

    let mut response = build_page_response(
        StatusCode::MOVED_PERMANENTLY,
        text,
        "text/html; charset=utf-8",
        is_head,
    );
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(header::LOCATION, value);
        }
        Err(e) => log_build_error("301", &e),
    }
    response
}

/// Build 416 Range Not Satisfiable response, no body
pub fn build_416_response(len: u64) -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header(header::CONTENT_RANGE, super::range::unsatisfied_range(len))
        .header(header::CONTENT_LENGTH, 0)
        .body(empty_body())
        .unwrap_or_else(|e| {
            log_build_error("416", &e);
            bare_response(StatusCode::RANGE_NOT_SATISFIABLE)
        })
}

/// Build a response around in-memory content; HEAD keeps the headers but drops the body
pub fn build_page_response(
    status: StatusCode,
    content: impl Into<Bytes>,
    content_type: &str,
    is_head: bool,
) -> Response<ResponseBody> {
    let content = content.into();
    let content_length = content.len();
    let body = if is_head {
        empty_body()
    } else {
        full_body(content)
    };

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, content_length)
        .header("Content-Security-Policy", "default-src 'none'")
        .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(body)
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            bare_response(status)
        })
}

fn bare_response(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(empty_body());
    *response.status_mut() = status;
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &dyn std::error::Error) {
    log::error!("Failed to build {status} response: {error}");
}
