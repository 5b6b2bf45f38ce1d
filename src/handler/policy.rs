//! Error and redirect policy
//!
//! The single place turning a `TransferError` into a response: custom error pages, the favicon
//! substitute and the generic pages.

use hyper::header::{self, HeaderValue};
use hyper::{Response, StatusCode};
use percent_encoding::percent_decode_str;
use std::error::Error as _;
use tokio::fs;

use super::locate::{locate, Located};
use super::report::TransferOutcome;
use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::http::response::{
    build_416_response, build_error_response, build_page_response, build_redirect_response,
};
use crate::http::{mime, resolve, ResponseBody};

const FAVICON_PATH: &str = "/favicon.ico";

/// Response for a failed transfer together with the outcome to report
pub async fn error_response(
    err: &TransferError,
    request_path: &str,
    config: &TransferConfig,
    is_head: bool,
) -> (Response<ResponseBody>, TransferOutcome) {
    let status = err.status();
    log_error(err, request_path);

    if matches!(err, TransferError::NotFound) && is_favicon_request(request_path) {
        if let Some(location) = favicon_substitute(config).await {
            log::debug!("Redirecting {FAVICON_PATH} to {location}");
            let response = build_redirect_response(&location, is_head);
            return (response, TransferOutcome::Redirect(location));
        }
    }

    let outcome = TransferOutcome::Error(status, describe(err));

    let mut response = match err {
        TransferError::RangeNotSatisfiable { length } => build_416_response(*length),
        _ => match custom_page(status, config, is_head).await {
            Some(response) => response,
            None => build_error_response(status, is_head),
        },
    };

    if matches!(err, TransferError::MethodNotAllowed) {
        response
            .headers_mut()
            .insert(header::ALLOW, HeaderValue::from_static("GET, HEAD"));
    }

    (response, outcome)
}

fn log_error(err: &TransferError, request_path: &str) {
    match err {
        TransferError::NotFound | TransferError::RangeNotSatisfiable { .. } => {
            log::debug!("{request_path}: {err}");
        }
        TransferError::BadRequest(_)
        | TransferError::Forbidden(_)
        | TransferError::MethodNotAllowed => log::warn!("Rejected {request_path}: {err}"),
        TransferError::Internal { .. } => log::error!("{request_path}: {}", describe(err)),
    }
}

/// Error message including its source chain
fn describe(err: &TransferError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Compared after percent-decoding, `/favicon%2Eico` names the same file
fn is_favicon_request(request_path: &str) -> bool {
    percent_decode_str(request_path).decode_utf8_lossy() == FAVICON_PATH
}

/// Location of the configured favicon if it differs from the default one and exists
async fn favicon_substitute(config: &TransferConfig) -> Option<String> {
    let favicon = config.favicon.as_deref()?;
    if favicon == FAVICON_PATH {
        return None;
    }
    let safe = resolve(favicon, config).ok()?;
    match locate(&safe, config).await {
        Ok(Located::File(_)) => Some(favicon.to_string()),
        _ => None,
    }
}

/// Configured page for the status, served with that status. Any failure falls back silently.
async fn custom_page(
    status: StatusCode,
    config: &TransferConfig,
    is_head: bool,
) -> Option<Response<ResponseBody>> {
    let page = config.error_pages.get(&status)?;
    let safe = resolve(page, config).ok()?;
    let Ok(Located::File(resource)) = locate(&safe, config).await else {
        log::debug!("Error page {page} for {status} not found, using the generic page");
        return None;
    };
    match fs::read(&resource.path).await {
        Ok(content) => Some(build_page_response(
            status,
            content,
            &mime::get_content_type(&resource.path),
            is_head,
        )),
        Err(e) => {
            log::warn!("Failed reading error page {}: {e}", resource.path.display());
            None
        }
    }
}
