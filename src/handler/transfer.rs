//! Transfer execution
//!
//! Emits the entity headers and streams the planned byte span of a file. The open file handle
//! lives inside `FileBody` and is released by whichever comes first: end of data, a read
//! error or the body being dropped by the connection.

use bytes::{Bytes, BytesMut};
use hyper::body::{Body, Frame, SizeHint};
use hyper::header;
use hyper::StatusCode;
use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, Take};
use tokio_util::io::poll_read_buf;

use super::locate::ResolvedResource;
use super::report::{Reporter, TransferOutcome};
use crate::config::TransferConfig;
use crate::error::TransferError;
use crate::http::{cache, mime, range, ByteWindow, RangeDecision, ResponseDraft, Validators};

/// Read chunk size
const CHUNK_SIZE: usize = 64 * 1024;

/// Everything decided about a transfer before the executor runs
#[derive(Debug, Clone, Copy)]
pub struct TransferPlan<'a> {
    pub resource: &'a ResolvedResource,
    pub validators: &'a Validators,
    pub window: ByteWindow,
    pub decision: RangeDecision,
    pub is_head: bool,
}

/// Result of the executor: headers ready, plus the positioned reader for a GET
#[derive(Debug)]
pub enum Prepared {
    Head(ResponseDraft),
    Body {
        draft: ResponseDraft,
        reader: Take<File>,
        len: u64,
    },
}

/// Set the entity headers of a file response. Headers already on the draft are kept, so a
/// second call changes nothing.
pub fn emit_headers(
    draft: &mut ResponseDraft,
    resource: &ResolvedResource,
    validators: &Validators,
    config: &TransferConfig,
) {
    draft.set_default(header::ACCEPT_RANGES, "bytes");
    draft.set_default(header::CACHE_CONTROL, &cache::cache_control(config.max_age));
    if let Some(last_modified) = validators.last_modified_header() {
        draft.set_default(header::LAST_MODIFIED, &last_modified);
    }
    if let Some(etag) = &validators.etag {
        draft.set_default(header::ETAG, etag);
    }
    draft.set_default(
        header::CONTENT_TYPE,
        &mime::get_content_type(&resource.path),
    );
}

/// Emit headers for the planned transfer and, for GET, open the file at the first byte.
pub async fn execute(
    mut draft: ResponseDraft,
    plan: TransferPlan<'_>,
    config: &TransferConfig,
) -> Result<Prepared, TransferError> {
    if draft.headers_sent() {
        return Err(TransferError::Internal {
            context: "headers already sent".into(),
            source: None,
        });
    }

    let (start, len) = match plan.decision {
        RangeDecision::Full => {
            draft.status = StatusCode::OK;
            (0, plan.window.len)
        }
        RangeDecision::Partial { start, end } => {
            draft.status = StatusCode::PARTIAL_CONTENT;
            let content_range = range::content_range(start, end, plan.window.len);
            if let Ok(value) = header::HeaderValue::from_str(&content_range) {
                draft.headers.insert(header::CONTENT_RANGE, value);
            }
            (start, end - start + 1)
        }
        RangeDecision::Unsatisfiable => {
            return Err(TransferError::RangeNotSatisfiable {
                length: plan.window.len,
            });
        }
    };

    emit_headers(&mut draft, plan.resource, plan.validators, config);
    draft
        .headers
        .insert(header::CONTENT_LENGTH, header::HeaderValue::from(len));

    if plan.is_head {
        log::debug!("HEAD {}: {len} bytes", plan.resource.path.display());
        return Ok(Prepared::Head(draft));
    }

    let path = &plan.resource.path;
    let mut file = File::open(path)
        .await
        .map_err(|e| TransferError::from_io(path, e))?;
    let offset = plan.window.offset + start;
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| TransferError::internal(format!("failed seeking {}", path.display()), e))?;
    }

    log::debug!(
        "Streaming {} bytes of {} from offset {offset}",
        len,
        path.display()
    );
    Ok(Prepared::Body {
        draft,
        reader: file.take(len),
        len,
    })
}

enum State {
    Streaming(Take<File>),
    Retired,
}

/// Response body streaming a file span.
///
/// Reports the transfer exactly once, when the reader retires.
pub struct FileBody {
    state: State,
    path: PathBuf,
    status: StatusCode,
    expected: u64,
    streamed: u64,
    reporter: Option<Reporter>,
}

impl FileBody {
    pub fn new(
        reader: Take<File>,
        len: u64,
        path: PathBuf,
        status: StatusCode,
        reporter: Reporter,
    ) -> Self {
        Self {
            state: State::Streaming(reader),
            path,
            status,
            expected: len,
            streamed: 0,
            reporter: Some(reporter),
        }
    }

    /// Release the file handle and deliver the report; later calls do nothing
    fn retire(&mut self, outcome: TransferOutcome) {
        if matches!(self.state, State::Retired) {
            return;
        }
        self.state = State::Retired;
        if let Some(reporter) = self.reporter.take() {
            reporter.finish(self.status, outcome, self.streamed);
        }
    }
}

impl Body for FileBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let State::Streaming(reader) = &mut this.state else {
            return Poll::Ready(None);
        };

        let remaining = this.expected - this.streamed;
        let capacity = usize::try_from(remaining).map_or(CHUNK_SIZE, |r| r.clamp(1, CHUNK_SIZE));
        let mut buf = BytesMut::with_capacity(capacity);

        match poll_read_buf(Pin::new(reader), cx, &mut buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(0)) => {
                if this.streamed < this.expected {
                    log::warn!(
                        "{} shrank during transfer, sent {} of {} bytes",
                        this.path.display(),
                        this.streamed,
                        this.expected
                    );
                }
                this.retire(TransferOutcome::Success(this.streamed));
                Poll::Ready(None)
            }
            Poll::Ready(Ok(n)) => {
                this.streamed += n as u64;
                if this.streamed >= this.expected {
                    this.retire(TransferOutcome::Success(this.streamed));
                }
                Poll::Ready(Some(Ok(Frame::data(buf.freeze()))))
            }
            Poll::Ready(Err(e)) => {
                log::error!(
                    "Failed reading {} after {} bytes: {e}",
                    this.path.display(),
                    this.streamed
                );
                this.retire(TransferOutcome::Error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    e.to_string(),
                ));
                Poll::Ready(Some(Err(e)))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        matches!(self.state, State::Retired)
    }

    fn size_hint(&self) -> SizeHint {
        match self.state {
            State::Streaming(_) => SizeHint::with_exact(self.expected - self.streamed),
            State::Retired => SizeHint::with_exact(0),
        }
    }
}

impl Drop for FileBody {
    fn drop(&mut self) {
        if matches!(self.state, State::Streaming(_)) {
            log::debug!(
                "Transfer of {} cancelled after {} bytes",
                self.path.display(),
                self.streamed
            );
            self.retire(TransferOutcome::Cancelled(self.streamed));
        }
    }
}

impl std::fmt::Debug for FileBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBody")
            .field("path", &self.path)
            .field("expected", &self.expected)
            .field("streamed", &self.streamed)
            .finish_non_exhaustive()
    }
}
