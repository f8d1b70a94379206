//! The transport seam. Backends build [http::Request]s; an [HttpClientExt] sends them.
//!
//! [reqwest::Client] is the production implementation. Tests substitute an in-memory transport.

use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;
use http::StatusCode;
pub use http::{HeaderMap, HeaderValue, Method, Request, Response, Uri, request::Builder};

pub mod sse;
pub(crate) mod util;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Http error: {0}")]
    Protocol(#[from] http::Error),
    #[error("Invalid status code {0} with message: {1}")]
    InvalidStatusCodeWithMessage(StatusCode, String),
    #[error("Invalid content type was returned: {0:?}")]
    InvalidContentType(HeaderValue),
    #[error("Event stream error: {0}")]
    EventStream(String),
    #[error("Http client error: {0}")]
    Instance(#[from] Box<dyn std::error::Error + Send + Sync + 'static>),
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn instance_error<E: std::error::Error + Send + Sync + 'static>(error: E) -> Error {
    Error::Instance(error.into())
}

/// A live response body.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Sends requests built by a backend. Non-2xx responses are reported as
/// [Error::InvalidStatusCodeWithMessage] carrying the body, so the caller can normalize it.
pub trait HttpClientExt: Clone + Send + Sync + 'static {
    /// Send a request and buffer the whole response body.
    fn send(
        &self,
        req: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send + 'static;

    /// Send a request and get the body back as a live stream of chunks.
    fn send_streaming(
        &self,
        req: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<ByteStream>>> + Send + 'static;
}

impl HttpClientExt for reqwest::Client {
    fn send(
        &self,
        req: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<Bytes>>> + Send + 'static {
        let pending = execute(self, req);
        async move {
            let (head, response) = pending.await?;
            let body = response.bytes().await.map_err(instance_error)?;
            head.body(body).map_err(Error::Protocol)
        }
    }

    fn send_streaming(
        &self,
        req: Request<Bytes>,
    ) -> impl Future<Output = Result<Response<ByteStream>>> + Send + 'static {
        let pending = execute(self, req);
        async move {
            let (head, response) = pending.await?;
            let body: ByteStream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(instance_error))
                .boxed();
            head.body(body).map_err(Error::Protocol)
        }
    }
}

/// Send `req` and check the status. On success, returns the response head to attach a body to
/// and the reqwest response still holding that body.
fn execute(
    client: &reqwest::Client,
    req: Request<Bytes>,
) -> impl Future<Output = Result<(http::response::Builder, reqwest::Response)>> + Send + 'static {
    let (parts, body) = req.into_parts();
    let pending = client
        .request(parts.method, parts.uri.to_string())
        .headers(parts.headers)
        .body(body)
        .send();

    async move {
        let response = pending.await.map_err(instance_error)?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.map_err(instance_error)?;
            return Err(Error::InvalidStatusCodeWithMessage(status, message));
        }
        let mut head = Response::builder()
            .status(status)
            .version(response.version());
        if let Some(headers) = head.headers_mut() {
            headers.extend(response.headers().clone());
        }
        Ok((head, response))
    }
}
