//! File-transfer engine
//!
//! Drives one request through resolve, locate, freshness, range planning and execution. The
//! engine holds configuration and collaborators only, so a single instance serves every
//! connection.

use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use hyper::http::request::Parts;
use hyper::{Method, Response, StatusCode, Version};
use percent_encoding::percent_decode_str;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::Take;

use super::listing::{read_entries, DirectoryRenderer, HtmlListing};
use super::locate::{locate, Located, ResolvedResource};
use super::policy;
use super::report::{NoopObserver, Reporter, TransferObserver, TransferOutcome};
use super::transfer::{emit_headers, execute, FileBody, Prepared, TransferPlan};
use crate::config::{AccessPolicy, TransferConfig};
use crate::error::TransferError;
use crate::http::response::{build_page_response, build_redirect_response, empty_body};
use crate::http::{cache, range, resolve, ByteWindow, ResponseBody, ResponseDraft};

/// Everything the engine needs to know about an inbound request
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub method: Method,
    /// Request path, still percent-encoded
    pub path: String,
    pub query: Option<String>,
    pub version: Version,
    pub headers: HeaderMap,
    pub remote_addr: Option<SocketAddr>,
}

impl TransferRequest {
    /// Request for an origin-form target such as `/docs/a.txt?v=2`
    pub fn new(method: Method, target: &str) -> Self {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query.to_string())),
            None => (target, None),
        };
        Self {
            method,
            path: path.to_string(),
            query,
            version: Version::HTTP_11,
            headers: HeaderMap::new(),
            remote_addr: None,
        }
    }

    pub fn from_parts(parts: &Parts, remote_addr: Option<SocketAddr>) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_owned),
            version: parts.version,
            headers: parts.headers.clone(),
            remote_addr,
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    fn is_head(&self) -> bool {
        self.method == Method::HEAD
    }
}

/// How a request got answered
enum Served {
    /// Complete response, report right away
    Immediate(Response<ResponseBody>, TransferOutcome),
    /// File body still to be streamed, reported when it retires
    Streaming {
        draft: ResponseDraft,
        reader: Take<File>,
        len: u64,
        path: PathBuf,
    },
}

/// The file-transfer engine
#[derive(Clone)]
pub struct TransferEngine {
    config: Arc<TransferConfig>,
    observer: Arc<dyn TransferObserver>,
    renderer: Arc<dyn DirectoryRenderer>,
}

impl TransferEngine {
    pub fn new(config: TransferConfig) -> Self {
        Self {
            config: Arc::new(config),
            observer: Arc::new(NoopObserver),
            renderer: Arc::new(HtmlListing),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn TransferObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn DirectoryRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn config(&self) -> &TransferConfig {
        &self.config
    }

    /// Answer a request with a fresh response
    pub async fn serve(&self, request: &TransferRequest) -> Response<ResponseBody> {
        self.serve_with(request, ResponseDraft::new()).await
    }

    /// Answer a request into an existing response draft; headers already on the draft win
    pub async fn serve_with(
        &self,
        request: &TransferRequest,
        draft: ResponseDraft,
    ) -> Response<ResponseBody> {
        let reporter = Reporter::new(Arc::clone(&self.observer), request);
        let is_head = request.is_head();

        let served = match self.run(request, draft).await {
            Ok(served) => served,
            Err(err) => {
                let (response, outcome) =
                    policy::error_response(&err, &request.path, &self.config, is_head).await;
                Served::Immediate(response, outcome)
            }
        };

        match served {
            Served::Immediate(response, outcome) => {
                let body_bytes = response.body().size_hint().exact().unwrap_or(0);
                reporter.finish(response.status(), outcome, body_bytes);
                response
            }
            Served::Streaming {
                draft,
                reader,
                len,
                path,
            } => {
                let body = FileBody::new(reader, len, path, draft.status, reporter);
                draft.into_response(body.boxed())
            }
        }
    }

    async fn run(
        &self,
        request: &TransferRequest,
        mut draft: ResponseDraft,
    ) -> Result<Served, TransferError> {
        let config = &*self.config;
        let is_head = request.is_head();

        if request.method != Method::GET && !is_head {
            return Err(TransferError::MethodNotAllowed);
        }

        let safe = resolve(&request.path, config)?;
        log::debug!("{} resolved to {}", request.path, safe.path().display());

        let resource = match locate(&safe, config).await? {
            Located::File(resource) => resource,
            Located::Redirect(location) => {
                let location = match &request.query {
                    Some(query) => format!("{location}?{query}"),
                    None => location,
                };
                log::debug!("Redirecting {} to {location}", request.path);
                let response = build_redirect_response(&location, is_head);
                return Ok(Served::Immediate(
                    response,
                    TransferOutcome::Redirect(location),
                ));
            }
            Located::Listing(directory) => return self.listing(&directory, request, is_head).await,
        };

        if draft.headers_sent() {
            return Err(TransferError::Internal {
                context: "headers already sent".into(),
                source: None,
            });
        }

        let freshness = cache::evaluate(&request.headers, &resource, config, draft.status);
        if freshness.not_modified {
            log::debug!("{} not modified", request.path);
            draft.status = StatusCode::NOT_MODIFIED;
            emit_headers(&mut draft, &resource, &freshness.validators, config);
            cache::strip_content_headers(&mut draft.headers);
            return Ok(Served::Immediate(
                draft.into_response(empty_body()),
                TransferOutcome::NotModified,
            ));
        }

        let window = ByteWindow::new(resource.size, config.start, config.end);
        let decision = range::plan(&request.headers, window.len, &freshness.validators);
        log::debug!("{} planned as {decision:?} over {window:?}", request.path);

        let plan = TransferPlan {
            resource: &resource,
            validators: &freshness.validators,
            window,
            decision,
            is_head,
        };
        match execute(draft, plan, config).await? {
            Prepared::Head(draft) | Prepared::Body { draft, len: 0, .. } => Ok(Served::Immediate(
                draft.into_response(empty_body()),
                TransferOutcome::Success(0),
            )),
            Prepared::Body { draft, reader, len } => Ok(Served::Streaming {
                draft,
                reader,
                len,
                path: resource.path,
            }),
        }
    }

    async fn listing(
        &self,
        directory: &ResolvedResource,
        request: &TransferRequest,
        is_head: bool,
    ) -> Result<Served, TransferError> {
        let show_hidden = self.config.dot_files == AccessPolicy::Allow;
        let entries = read_entries(&directory.path, show_hidden)
            .await
            .map_err(|e| TransferError::from_io(&directory.path, e))?;

        let uri_path = percent_decode_str(&request.path).decode_utf8_lossy();
        let page = self.renderer.render(&uri_path, &entries);
        let len = page.len() as u64;
        log::debug!(
            "Listing {} with {} entries",
            directory.path.display(),
            entries.len()
        );

        let response = build_page_response(
            StatusCode::OK,
            page,
            self.renderer.content_type(),
            is_head,
        );
        let bytes = if is_head { 0 } else { len };
        Ok(Served::Immediate(response, TransferOutcome::Success(bytes)))
    }
}

impl std::fmt::Debug for TransferEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::report::testing::Recorder;
    use hyper::header;

    fn engine() -> (tempfile::TempDir, TransferEngine, Arc<Recorder>) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), "hello world").unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        let recorder = Arc::new(Recorder::default());
        let engine = TransferEngine::new(TransferConfig::new(dir.path()).unwrap())
            .with_observer(recorder.clone());
        (dir, engine, recorder)
    }

    #[test]
    fn test_request_target_split() {
        let request = TransferRequest::new(Method::GET, "/a/b.txt?x=1&y=2");
        assert_eq!(request.path, "/a/b.txt");
        assert_eq!(request.query.as_deref(), Some("x=1&y=2"));

        let request = TransferRequest::new(Method::HEAD, "/");
        assert!(request.query.is_none());
        assert!(request.is_head());
    }

    #[tokio::test]
    async fn test_method_not_allowed_before_filesystem() {
        let (_dir, engine, recorder) = engine();
        let request = TransferRequest::new(Method::POST, "/../../etc/passwd");
        let response = engine.serve(&request).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET, HEAD");
        assert!(matches!(
            recorder.outcomes()[..],
            [TransferOutcome::Error(StatusCode::METHOD_NOT_ALLOWED, _)]
        ));
    }

    #[tokio::test]
    async fn test_redirect_keeps_query() {
        let (_dir, engine, recorder) = engine();
        let request = TransferRequest::new(Method::GET, "/docs?sort=name");
        let response = engine.serve(&request).await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[header::LOCATION], "/docs/?sort=name");
        assert_eq!(
            recorder.outcomes(),
            vec![TransferOutcome::Redirect("/docs/?sort=name".into())]
        );
    }

    #[tokio::test]
    async fn test_streamed_report_waits_for_body() {
        let (_dir, engine, recorder) = engine();
        let request = TransferRequest::new(Method::GET, "/hello.txt");
        let response = engine.serve(&request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(recorder.outcomes().is_empty());

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"hello world");
        assert_eq!(recorder.outcomes(), vec![TransferOutcome::Success(11)]);
        let reports = recorder.reports.lock().unwrap();
        assert_eq!(reports[0].body_bytes, 11);
        assert_eq!(reports[0].status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sent_draft_is_internal_error() {
        let (_dir, engine, recorder) = engine();
        let mut draft = ResponseDraft::new();
        draft.mark_sent();
        let request = TransferRequest::new(Method::GET, "/hello.txt");
        let response = engine.serve_with(&request, draft).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(
            recorder.outcomes()[..],
            [TransferOutcome::Error(StatusCode::INTERNAL_SERVER_ERROR, _)]
        ));
    }

    #[tokio::test]
    async fn test_draft_headers_are_kept() {
        let (_dir, engine, _) = engine();
        let mut draft = ResponseDraft::new();
        draft.set_default(header::CACHE_CONTROL, "no-store");
        draft.set_default(header::CONTENT_TYPE, "text/x-custom");
        let request = TransferRequest::new(Method::GET, "/hello.txt");
        let response = engine.serve_with(&request, draft).await;
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/x-custom");
    }
}
