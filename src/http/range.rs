//! HTTP Range request planning module
//!
//! Range header parsing for resumable downloads, compliant with RFC 7233 for the single range
//! case. `If-Range` decides whether the `Range` header is honoured at all.

use hyper::header::{self, HeaderMap};
use std::time::UNIX_EPOCH;

use super::cache::Validators;

/// Part of a file exposed to clients, narrowed by the `start`/`end` settings.
/// All range arithmetic works on `len`, reads add `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteWindow {
    pub offset: u64,
    pub len: u64,
}

impl ByteWindow {
    /// `end` is an inclusive absolute offset
    pub fn new(size: u64, start: Option<u64>, end: Option<u64>) -> Self {
        let offset = start.unwrap_or(0);
        let mut len = size.saturating_sub(offset);
        if let Some(end) = end {
            let bytes = end.checked_sub(offset).map_or(0, |n| n.saturating_add(1));
            len = len.min(bytes);
        }
        Self { offset, len }
    }
}

/// What part of the resource to send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeDecision {
    /// No usable range, send everything with 200
    Full,
    /// Inclusive bounds relative to the window, send with 206
    Partial { start: u64, end: u64 },
    /// Range outside of the resource, answer 416
    Unsatisfiable,
}

impl RangeDecision {
    /// Number of bytes to transfer
    pub const fn transfer_len(&self, window_len: u64) -> u64 {
        match *self {
            Self::Full => window_len,
            Self::Partial { start, end } => end - start + 1,
            Self::Unsatisfiable => 0,
        }
    }
}

/// Single range parse result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeParseResult {
    Valid(u64, u64),
    NotSatisfiable,
}

/// Plan the transfer from the `Range` and `If-Range` request headers.
///
/// Missing, malformed or `If-Range`-overruled ranges all give `Full`. With several ranges only
/// the first one is looked at: unsatisfiable gives 416, anything else a full response.
///
/// # Examples
/// ```
/// use filesend::http::cache::Validators;
/// use filesend::http::range::{plan, RangeDecision};
/// use hyper::header::{HeaderMap, HeaderValue, RANGE};
///
/// let mut headers = HeaderMap::new();
/// headers.insert(RANGE, HeaderValue::from_static("bytes=0-99"));
/// let decision = plan(&headers, 1000, &Validators::default());
/// assert_eq!(decision, RangeDecision::Partial { start: 0, end: 99 });
///
/// let decision = plan(&HeaderMap::new(), 1000, &Validators::default());
/// assert_eq!(decision, RangeDecision::Full);
/// ```
pub fn plan(request: &HeaderMap, len: u64, validators: &Validators) -> RangeDecision {
    let Some(range) = request.get(header::RANGE).and_then(|v| v.to_str().ok()) else {
        return RangeDecision::Full;
    };

    if let Some(if_range) = request.get(header::IF_RANGE) {
        let matches = if_range
            .to_str()
            .is_ok_and(|value| if_range_matches(value.trim(), validators));
        if !matches {
            return RangeDecision::Full;
        }
    }

    parse_range_header(range, len)
}

/// `If-Range` carries either an entity tag (strong comparison) or an HTTP-date
fn if_range_matches(value: &str, validators: &Validators) -> bool {
    if value.starts_with('"') || value.starts_with("W/") {
        return !value.starts_with("W/")
            && validators.etag.as_deref().is_some_and(|etag| etag == value);
    }

    let (Some(modified), Ok(date)) = (
        validators.last_modified,
        httpdate::parse_http_date(value),
    ) else {
        return false;
    };
    let secs = |t: std::time::SystemTime| t.duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
    secs(modified) == secs(date)
}

/// Parse the value of a `Range` header against the logical length
pub fn parse_range_header(header: &str, len: u64) -> RangeDecision {
    let Some(ranges) = header.trim().strip_prefix("bytes=") else {
        return RangeDecision::Full; // Not bytes unit, ignore
    };

    let mut parts = ranges.split(',');
    let first = parts.next().unwrap_or_default();
    let multiple = parts.next().is_some();

    match parse_single_range(first.trim(), len) {
        Some(RangeParseResult::NotSatisfiable) => RangeDecision::Unsatisfiable,
        Some(RangeParseResult::Valid(start, end)) if !multiple => {
            RangeDecision::Partial { start, end }
        }
        _ => RangeDecision::Full,
    }
}

/// Parse one `start-end`, `start-` or `-suffix` spec, `None` for invalid syntax
fn parse_single_range(spec: &str, len: u64) -> Option<RangeParseResult> {
    let (start_str, end_str) = spec.split_once('-')?;
    let (start_str, end_str) = (start_str.trim(), end_str.trim());

    // Suffix range: "-500" means last 500 bytes
    if start_str.is_empty() {
        let suffix = end_str.parse::<u64>().ok()?;
        if suffix == 0 || len == 0 {
            return Some(RangeParseResult::NotSatisfiable);
        }
        // Suffix larger than file is valid, just return whole file as range
        return Some(RangeParseResult::Valid(len.saturating_sub(suffix), len - 1));
    }

    let start = start_str.parse::<u64>().ok()?;
    let end = if end_str.is_empty() {
        None
    } else {
        Some(end_str.parse::<u64>().ok()?)
    };

    if start >= len {
        return Some(RangeParseResult::NotSatisfiable);
    }

    // Clamp end to len - 1
    let end = end.map_or(len - 1, |e| e.min(len - 1));
    if start > end {
        return Some(RangeParseResult::NotSatisfiable);
    }

    Some(RangeParseResult::Valid(start, end))
}

/// `Content-Range` value of a partial response
pub fn content_range(start: u64, end: u64, len: u64) -> String {
    format!("bytes {start}-{end}/{len}")
}

/// `Content-Range` value of a 416 response
pub fn unsatisfied_range(len: u64) -> String {
    format!("bytes */{len}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;
    use std::time::{Duration, SystemTime};

    fn validators() -> Validators {
        Validators {
            etag: Some("\"abc\"".into()),
            last_modified: Some(UNIX_EPOCH + Duration::from_secs(1_431_704_061)),
        }
    }

    fn request(range: &str, if_range: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, HeaderValue::from_str(range).unwrap());
        if let Some(value) = if_range {
            headers.insert(header::IF_RANGE, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn test_no_range() {
        assert_eq!(
            plan(&HeaderMap::new(), 100, &validators()),
            RangeDecision::Full
        );
    }

    #[test]
    fn test_standard_range() {
        let decision = parse_range_header("bytes=0-9", 100);
        assert_eq!(decision, RangeDecision::Partial { start: 0, end: 9 });
        assert_eq!(decision.transfer_len(100), 10);
    }

    #[test]
    fn test_open_range() {
        let decision = parse_range_header("bytes=50-", 100);
        assert_eq!(decision, RangeDecision::Partial { start: 50, end: 99 });
        assert_eq!(decision.transfer_len(100), 50);
    }

    #[test]
    fn test_end_clamped() {
        assert_eq!(
            parse_range_header("bytes=90-500", 100),
            RangeDecision::Partial { start: 90, end: 99 }
        );
    }

    #[test]
    fn test_suffix_range() {
        assert_eq!(
            parse_range_header("bytes=-20", 100),
            RangeDecision::Partial { start: 80, end: 99 }
        );
        assert_eq!(
            parse_range_header("bytes=-2000", 100),
            RangeDecision::Partial { start: 0, end: 99 }
        );
        assert_eq!(
            parse_range_header("bytes=-0", 100),
            RangeDecision::Unsatisfiable
        );
    }

    #[test]
    fn test_not_satisfiable() {
        assert_eq!(
            parse_range_header("bytes=200-", 100),
            RangeDecision::Unsatisfiable
        );
        assert_eq!(
            parse_range_header("bytes=100-100", 100),
            RangeDecision::Unsatisfiable
        );
        assert_eq!(
            parse_range_header("bytes=23-22", 100),
            RangeDecision::Unsatisfiable
        );
        assert_eq!(
            parse_range_header("bytes=0-", 0),
            RangeDecision::Unsatisfiable
        );
    }

    #[test]
    fn test_invalid_format() {
        assert_eq!(parse_range_header("bytes=a-b", 100), RangeDecision::Full);
        assert_eq!(parse_range_header("bytes=5", 100), RangeDecision::Full);
        assert_eq!(parse_range_header("eur=0-499", 100), RangeDecision::Full);
        assert_eq!(parse_range_header("bytes=-", 100), RangeDecision::Full);
    }

    #[test]
    fn test_multiple_ranges() {
        assert_eq!(
            parse_range_header("bytes=0-9,20-29", 100),
            RangeDecision::Full
        );
        assert_eq!(
            parse_range_header("bytes=500-600, 0-9", 100),
            RangeDecision::Unsatisfiable
        );
    }

    #[test]
    fn test_if_range_etag() {
        let v = validators();
        assert_eq!(
            plan(&request("bytes=0-9", Some("\"abc\"")), 100, &v),
            RangeDecision::Partial { start: 0, end: 9 }
        );
        assert_eq!(
            plan(&request("bytes=0-9", Some("\"xyz\"")), 100, &v),
            RangeDecision::Full
        );
        assert_eq!(
            plan(&request("bytes=0-9", Some("W/\"abc\"")), 100, &v),
            RangeDecision::Full
        );
    }

    #[test]
    fn test_if_range_date() {
        let v = validators();
        let modified = v.last_modified.unwrap();
        let same = httpdate::fmt_http_date(modified);
        let older = httpdate::fmt_http_date(modified - Duration::from_secs(60));
        let later = httpdate::fmt_http_date(modified + Duration::from_secs(86_400));
        assert_eq!(
            plan(&request("bytes=0-9", Some(&same)), 100, &v),
            RangeDecision::Partial { start: 0, end: 9 }
        );
        assert_eq!(
            plan(&request("bytes=0-9", Some(&older)), 100, &v),
            RangeDecision::Full
        );
        assert_eq!(
            plan(&request("bytes=0-9", Some(&later)), 100, &v),
            RangeDecision::Full
        );
        assert_eq!(
            plan(&request("bytes=0-9", Some("garbage")), 100, &v),
            RangeDecision::Full
        );
    }

    #[test]
    fn test_if_range_without_validators() {
        let date = httpdate::fmt_http_date(SystemTime::now());
        assert_eq!(
            plan(&request("bytes=0-9", Some(&date)), 100, &Validators::default()),
            RangeDecision::Full
        );
    }

    #[test]
    fn test_byte_window() {
        assert_eq!(
            ByteWindow::new(100, None, None),
            ByteWindow { offset: 0, len: 100 }
        );
        assert_eq!(
            ByteWindow::new(100, Some(10), None),
            ByteWindow { offset: 10, len: 90 }
        );
        assert_eq!(
            ByteWindow::new(100, Some(10), Some(19)),
            ByteWindow { offset: 10, len: 10 }
        );
        assert_eq!(
            ByteWindow::new(100, None, Some(500)),
            ByteWindow { offset: 0, len: 100 }
        );
        assert_eq!(
            ByteWindow::new(100, Some(200), None),
            ByteWindow { offset: 200, len: 0 }
        );
        assert_eq!(
            ByteWindow::new(100, Some(50), Some(40)),
            ByteWindow { offset: 50, len: 0 }
        );
    }

    #[test]
    fn test_content_range_values() {
        assert_eq!(content_range(0, 9, 100), "bytes 0-9/100");
        assert_eq!(unsatisfied_range(100), "bytes */100");
    }
}
