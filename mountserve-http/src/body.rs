//! Response body plumbing

use bytes::Bytes;
use futures::TryStreamExt;
use http::{Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use mountserve_core::server::HandlerResponse;
use mountserve_static::ByteStream;
use std::io;

/// Body type of every response this server writes
pub type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn full(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn stream(body: ByteStream) -> ResponseBody {
    StreamBody::new(body.map_ok(Frame::data)).boxed_unsync()
}

/// Bare 500 used when a response cannot even be built
pub fn fallback_error() -> Response<ResponseBody> {
    let mut response = Response::new(empty());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

/// Assemble a response from status, headers and body
pub fn build(
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
    body: ResponseBody,
) -> Response<ResponseBody> {
    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    builder.body(body).unwrap_or_else(|e| {
        tracing::error!("Failed to build response: {}", e);
        fallback_error()
    })
}

/// Convert a buffered response, dropping the body for `HEAD`
pub fn from_handler(response: HandlerResponse, head: bool) -> Response<ResponseBody> {
    let HandlerResponse {
        status,
        mut headers,
        body,
    } = response;

    let body = match body {
        Some(bytes) => {
            headers.push(("Content-Length", bytes.len().to_string()));
            if head { empty() } else { full(bytes) }
        }
        None => empty(),
    };
    build(status, headers, body)
}
