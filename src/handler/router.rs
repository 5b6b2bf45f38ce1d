//! Request dispatch module
//!
//! Entry point for HTTP request processing: turns the hyper request into a `TransferRequest`,
//! runs the engine and stamps the server-wide headers.

use crate::config::AppState;
use crate::handler::TransferRequest;
use crate::http::ResponseBody;
use hyper::header::SERVER;
use hyper::{Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<ResponseBody>, Infallible> {
    let (parts, _body) = req.into_parts();
    let request = TransferRequest::from_parts(&parts, Some(peer_addr));
    log::trace!(
        "{} {} {:?} from {peer_addr}",
        request.method,
        request.path,
        request.version
    );

    let mut response = state.engine.serve(&request).await;
    if let Some(name) = &state.server_name {
        response.headers_mut().insert(SERVER, name.clone());
    }
    Ok(response)
}
