//! Per-mount request handling

use crate::body::{self, ResponseBody};
use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use hyper::body::Body;
use mountserve_core::server::{HandlerResponse, Mount};
use mountserve_static::{
    BufferPool, ContentRequest, FileServer, FileServerConfig, FileSystem, FsError, MountFs, Served,
};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

const ALLOW_READONLY: &str = "GET, HEAD";
const ALLOW_WRITABLE: &str = "GET, HEAD, PUT, MKCOL, DELETE";

/// Permission bits for directories created with `MKCOL`
const DIR_MODE: u32 = 0o755;

/// Serves one mount
#[derive(Debug, Clone)]
pub struct MountHandler {
    server: FileServer,
}

impl MountHandler {
    pub fn new(mount: &Mount, config: FileServerConfig, pool: BufferPool, cancel: CancellationToken) -> Self {
        let fs = MountFs::new(&mount.local_dir, mount.readonly, mount.show_hidden);
        Self {
            server: FileServer::new(fs, config, pool, cancel),
        }
    }

    fn fs(&self) -> &MountFs {
        self.server.fs()
    }

    /// Handle a request whose path has already been rewritten to `path`
    pub async fn handle<B>(&self, req: Request<B>, path: &str, url_path: &str) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: std::fmt::Display,
    {
        let method = req.method().clone();
        match method {
            Method::GET | Method::HEAD => {
                let range = req
                    .headers()
                    .get(http::header::RANGE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let location = directory_location(req.uri());
                drop(req);
                let content = ContentRequest {
                    path,
                    url_path,
                    range: range.as_deref(),
                };
                self.get(content, &location, method == Method::HEAD).await
            }
            Method::PUT => self.put(req.into_body(), path).await,
            ref m if m.as_str() == "MKCOL" => self.mkcol(path).await,
            Method::DELETE => self.delete(path).await,
            _ => {
                let allow = if self.fs().is_readonly() {
                    ALLOW_READONLY
                } else {
                    ALLOW_WRITABLE
                };
                body::from_handler(HandlerResponse::method_not_allowed(allow), false)
            }
        }
    }

    /// `location` is where a directory without its trailing slash redirects to
    async fn get(&self, content: ContentRequest<'_>, location: &str, head: bool) -> Response<ResponseBody> {
        match self.server.serve(content).await {
            Ok(Served::File(file)) => {
                let headers = file.headers();
                let body = match file.body {
                    Some(stream) if !head => body::stream(stream),
                    _ => body::empty(),
                };
                body::build(file.status, headers, body)
            }
            Ok(Served::Listing(html)) => body::from_handler(HandlerResponse::html(html), head),
            Ok(Served::DirectoryRedirect) => body::from_handler(
                HandlerResponse::redirect(location, StatusCode::MOVED_PERMANENTLY),
                head,
            ),
            Err(e) => fs_error(e, head),
        }
    }

    async fn put<B>(&self, mut incoming: B, path: &str) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: std::fmt::Display,
    {
        if path.ends_with('/') {
            return fs_error(FsError::IsDirectory, false);
        }

        let mut file = match self.fs().create(path).await {
            Ok(file) => file,
            Err(e) => return fs_error(e, false),
        };

        let mut written: u64 = 0;
        while let Some(frame) = incoming.frame().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Upload aborted: {}", e);
                    drop(file);
                    self.discard(path).await;
                    return body::from_handler(
                        HandlerResponse::error(StatusCode::BAD_REQUEST, "upload_aborted", "Upload aborted"),
                        false,
                    );
                }
            };
            if let Some(data) = frame.data_ref() {
                if let Err(e) = file.write_all(data).await {
                    drop(file);
                    self.discard(path).await;
                    return fs_error(FsError::FileAccess(e), false);
                }
                written += data.len() as u64;
            }
        }
        if let Err(e) = file.flush().await {
            drop(file);
            self.discard(path).await;
            return fs_error(FsError::FileAccess(e), false);
        }

        tracing::info!(path, bytes = written, "📤 Stored upload");
        body::from_handler(HandlerResponse::status(StatusCode::CREATED), false)
    }

    /// Remove a partially written upload
    async fn discard(&self, path: &str) {
        if let Err(e) = self.fs().remove(path).await {
            tracing::warn!(path, error = ?e, "Failed to remove partial upload");
        }
    }

    async fn mkcol(&self, path: &str) -> Response<ResponseBody> {
        match self.fs().mkdir(path, DIR_MODE).await {
            Ok(()) => {
                tracing::info!(path, "📁 Created directory");
                body::from_handler(HandlerResponse::status(StatusCode::CREATED), false)
            }
            Err(e) => fs_error(e, false),
        }
    }

    async fn delete(&self, path: &str) -> Response<ResponseBody> {
        match self.fs().remove(path).await {
            Ok(()) => {
                tracing::info!(path, "🗑️ Removed");
                body::from_handler(HandlerResponse::status(StatusCode::NO_CONTENT), false)
            }
            Err(e) => fs_error(e, false),
        }
    }
}

/// Where a directory requested without its trailing slash redirects to
///
/// Keeps the raw encoded path and query. Leading slashes collapse to one so
/// a request for `//host/dir` cannot become a protocol-relative redirect.
fn directory_location(uri: &http::Uri) -> String {
    let mut location = format!("/{}/", uri.path().trim_start_matches('/'));
    if let Some(query) = uri.query() {
        location.push('?');
        location.push_str(query);
    }
    location
}

/// Map a filesystem error to a JSON error response
fn fs_error(err: FsError, head: bool) -> Response<ResponseBody> {
    let status = err.status();
    if status.is_server_error() {
        tracing::error!(error = ?err, "❌ Filesystem error");
    } else {
        tracing::debug!(code = err.code(), "Request refused");
    }
    body::from_handler(HandlerResponse::error(status, err.code(), &err.to_string()), head)
}
