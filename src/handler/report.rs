//! Transfer outcomes and their reporting
//!
//! Every request ends in exactly one `TransferReport`, handed to the `TransferObserver` the
//! engine was built with. Streamed bodies report when they retire.

use hyper::header::{HeaderName, REFERER, USER_AGENT};
use hyper::{Method, StatusCode, Version};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::engine::TransferRequest;

/// How a transfer ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Body fully written (or headers only for HEAD), with the number of body bytes
    Success(u64),
    NotModified,
    Redirect(String),
    /// Error status and the cause, never shown to the client
    Error(StatusCode, String),
    /// The client went away after the given number of body bytes
    Cancelled(u64),
}

impl TransferOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "ok",
            Self::NotModified => "not-modified",
            Self::Redirect(_) => "redirect",
            Self::Error(..) => "error",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

/// Summary of a finished request
#[derive(Debug, Clone)]
pub struct TransferReport {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub version: Version,
    pub remote_addr: Option<SocketAddr>,
    pub referer: Option<String>,
    pub user_agent: Option<String>,
    /// Status sent to the client
    pub status: StatusCode,
    pub outcome: TransferOutcome,
    /// Body bytes handed to the connection
    pub body_bytes: u64,
    pub elapsed: Duration,
}

/// Receives one report per request
pub trait TransferObserver: Send + Sync {
    fn finished(&self, report: &TransferReport);
}

/// Observer discarding every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl TransferObserver for NoopObserver {
    fn finished(&self, _report: &TransferReport) {}
}

/// Pending report of one request; consumed by `finish`, so it can only be delivered once
pub struct Reporter {
    observer: Arc<dyn TransferObserver>,
    method: Method,
    path: String,
    query: Option<String>,
    version: Version,
    remote_addr: Option<SocketAddr>,
    referer: Option<String>,
    user_agent: Option<String>,
    started: Instant,
}

impl Reporter {
    pub fn new(observer: Arc<dyn TransferObserver>, request: &TransferRequest) -> Self {
        let header = |name: HeaderName| {
            request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };

        Self {
            observer,
            method: request.method.clone(),
            path: request.path.clone(),
            query: request.query.clone(),
            version: request.version,
            remote_addr: request.remote_addr,
            referer: header(REFERER),
            user_agent: header(USER_AGENT),
            started: Instant::now(),
        }
    }

    pub fn finish(self, status: StatusCode, outcome: TransferOutcome, body_bytes: u64) {
        let report = TransferReport {
            method: self.method,
            path: self.path,
            query: self.query,
            version: self.version,
            remote_addr: self.remote_addr,
            referer: self.referer,
            user_agent: self.user_agent,
            status,
            outcome,
            body_bytes,
            elapsed: self.started.elapsed(),
        };
        self.observer.finished(&report);
    }
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("method", &self.method)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Recorder;
    use super::*;
    use hyper::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_report_carries_request_summary() {
        let recorder = Arc::new(Recorder::default());
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.0"));
        let request = TransferRequest {
            method: Method::GET,
            path: "/a.txt".into(),
            query: Some("v=1".into()),
            version: Version::HTTP_11,
            headers,
            remote_addr: Some("127.0.0.1:4000".parse().unwrap()),
        };

        let reporter = Reporter::new(recorder.clone(), &request);
        reporter.finish(StatusCode::OK, TransferOutcome::Success(5), 5);

        let reports = recorder.reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.path, "/a.txt");
        assert_eq!(report.query.as_deref(), Some("v=1"));
        assert_eq!(report.user_agent.as_deref(), Some("curl/8.0"));
        assert!(report.referer.is_none());
        assert_eq!(report.outcome, TransferOutcome::Success(5));
        assert_eq!(report.body_bytes, 5);
    }
}
