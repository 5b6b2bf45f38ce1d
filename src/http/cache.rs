//! HTTP cache control module
//!
//! Provides validator generation (`ETag`, `Last-Modified`) and conditional request evaluation.

use hyper::header::{self, HeaderMap, HeaderName};
use hyper::StatusCode;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::TransferConfig;
use crate::handler::locate::ResolvedResource;

/// Cache validators of a resource, each present only when enabled in the configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<SystemTime>,
}

impl Validators {
    pub fn for_resource(resource: &ResolvedResource, config: &TransferConfig) -> Self {
        Self {
            etag: config
                .etag
                .then(|| generate_etag(resource.size, resource.mtime)),
            last_modified: config.last_modified.then_some(resource.mtime),
        }
    }

    /// `Last-Modified` header value
    pub fn last_modified_header(&self) -> Option<String> {
        self.last_modified.map(httpdate::fmt_http_date)
    }
}

/// Outcome of the freshness evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Freshness {
    pub validators: Validators,
    /// The client's copy is current, answer 304
    pub not_modified: bool,
}

/// Generate a strong `ETag` from size and modification time
///
/// # Returns
/// Quoted `ETag` string, e.g., `"1f4-18c2b5e7a10"`
pub fn generate_etag(size: u64, mtime: SystemTime) -> String {
    let millis = mtime
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    format!("\"{size:x}-{millis:x}\"")
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Weak `ETags`: `W/"abc123"` (weak comparison)
/// - Wildcard: `*`
pub fn check_etag_match(if_none_match: &str, etag: Option<&str>) -> bool {
    if if_none_match.trim() == "*" {
        return true;
    }
    let Some(etag) = etag else {
        return false;
    };
    let etag = etag.strip_prefix("W/").unwrap_or(etag);
    if_none_match.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}

/// Whether the resource was not modified after the `If-Modified-Since` date, compared in whole
/// seconds
pub fn check_not_modified_since(if_modified_since: &str, last_modified: Option<SystemTime>) -> bool {
    let (Some(modified), Ok(since)) = (last_modified, httpdate::parse_http_date(if_modified_since))
    else {
        return false;
    };
    whole_seconds(modified) <= whole_seconds(since)
}

fn whole_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs())
}

/// Statuses a 304 may stand in for
pub fn is_cacheable(status: StatusCode) -> bool {
    status.is_success() || status == StatusCode::NOT_MODIFIED
}

/// Decide whether a conditional request can be answered with 304 Not Modified.
///
/// `status` is the status the response would otherwise get.
pub fn evaluate(
    request: &HeaderMap,
    resource: &ResolvedResource,
    config: &TransferConfig,
    status: StatusCode,
) -> Freshness {
    let validators = Validators::for_resource(resource, config);
    let not_modified = is_cacheable(status) && is_fresh(request, &validators);
    Freshness {
        validators,
        not_modified,
    }
}

fn is_fresh(request: &HeaderMap, validators: &Validators) -> bool {
    let if_none_match = header_str(request, &header::IF_NONE_MATCH);
    let if_modified_since = header_str(request, &header::IF_MODIFIED_SINCE);

    if if_none_match.is_none() && if_modified_since.is_none() {
        return false;
    }

    let no_cache = request
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-cache"));
    if no_cache {
        return false;
    }

    if let Some(if_none_match) = if_none_match {
        return check_etag_match(if_none_match, validators.etag.as_deref());
    }

    if_modified_since
        .is_some_and(|since| check_not_modified_since(since, validators.last_modified))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Remove every `Content-*` header, a 304 response must not describe a body
pub fn strip_content_headers(headers: &mut HeaderMap) {
    let names: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("content-"))
        .cloned()
        .collect();
    for name in names {
        headers.remove(name);
    }
}

/// `Cache-Control` header value for served files
pub fn cache_control(max_age: u64) -> String {
    format!("public, max-age={max_age}")
}
