//! HTTP/1.1 listener and top-level dispatch

use crate::body::{self, ResponseBody};
use crate::handler::MountHandler;
use bytes::Bytes;
use futures::FutureExt;
use http::{HeaderValue, Request, Response, StatusCode};
use hyper::body::Body;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use mountserve_core::config::{MountserveConfig, ServerConfig};
use mountserve_core::server::{HandlerResponse, Mount, MountInfo, MountRouter};
use mountserve_core::{Error, Result};
use mountserve_static::pool::DEFAULT_POOL_CAPACITY;
use mountserve_static::{BufferPool, FileServerConfig};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

const SERVER_NAME: &str = "mountserve";

/// Routes requests to mounts and serves them
pub struct MountServer {
    router: MountRouter<MountHandler>,
    cancel: CancellationToken,
}

impl MountServer {
    /// Build handlers for already validated mounts
    pub fn new(mounts: Vec<Mount>, server: &ServerConfig, cancel: CancellationToken) -> Result<Self> {
        let files = FileServerConfig {
            index: server.index.clone(),
            browse: server.browse,
        };
        let pool = BufferPool::new(server.chunk_size, DEFAULT_POOL_CAPACITY);

        let entries = mounts
            .into_iter()
            .map(|mount| {
                let handler = MountHandler::new(&mount, files.clone(), pool.clone(), cancel.clone());
                (mount, handler)
            })
            .collect();

        Ok(Self {
            router: MountRouter::new(entries)?,
            cancel,
        })
    }

    /// Validate a configuration and build a server from it
    pub fn from_config(config: &MountserveConfig, cancel: CancellationToken) -> Result<Self> {
        let mounts = config.validate()?;
        Self::new(mounts, &config.server, cancel)
    }

    pub fn router(&self) -> &MountRouter<MountHandler> {
        &self.router
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Route and serve one request
    ///
    /// A panic anywhere in the mount handler becomes a 500. Nothing has been
    /// sent at that point because responses are only written once returned.
    pub async fn dispatch<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: std::fmt::Display,
    {
        let start = Instant::now();
        let method = req.method().clone();
        let raw_path = req.uri().path().to_string();

        let handled = AssertUnwindSafe(self.route(req)).catch_unwind().await;
        let (mut response, info) = match handled {
            Ok(routed) => routed,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(method = %method, path = %raw_path, "💥 Handler panicked: {}", reason);
                (body::from_handler(HandlerResponse::internal_error(), false), None)
            }
        };

        let headers = response.headers_mut();
        headers.insert(http::header::SERVER, HeaderValue::from_static(SERVER_NAME));
        headers.insert(
            http::header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );

        tracing::debug!(
            method = %method,
            path = %raw_path,
            mount = info.as_ref().map(|i| i.path.as_str()).unwrap_or("-"),
            status = response.status().as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request served"
        );

        if let Some(info) = info {
            response.extensions_mut().insert(info);
        }
        response
    }

    async fn route<B>(&self, mut req: Request<B>) -> (Response<ResponseBody>, Option<MountInfo>)
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: std::fmt::Display,
    {
        let head = req.method() == http::Method::HEAD;
        let decoded = match urlencoding::decode(req.uri().path()) {
            Ok(path) => path.into_owned(),
            Err(_) => {
                let response = HandlerResponse::error(StatusCode::BAD_REQUEST, "bad_request", "Malformed request path");
                return (body::from_handler(response, head), None);
            }
        };

        if decoded == "/" {
            if let Some(location) = self.root_redirect() {
                let response = HandlerResponse::redirect(&location, StatusCode::FOUND);
                return (body::from_handler(response, head), None);
            }
        }

        // The router lock is released here, before any filesystem access
        let Some(route) = self.router.find_best_match(&decoded) else {
            return (body::from_handler(HandlerResponse::not_found(), head), None);
        };

        let info = route.info();
        req.extensions_mut().insert(info.clone());

        let response = route.handler().handle(req, &route.path, &decoded).await;
        (response, Some(info))
    }

    /// Where `/` goes when the first declared mount is not at the root
    fn root_redirect(&self) -> Option<String> {
        let first = self.router.first_mount()?;
        if first.mount.is_root() {
            return None;
        }
        let mut location = String::new();
        for segment in first.mount.url_prefix.split('/').filter(|s| !s.is_empty()) {
            location.push('/');
            location.push_str(&urlencoding::encode(segment));
        }
        location.push('/');
        Some(location)
    }

    /// Accept connections until the cancellation token fires
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        tracing::info!("🚀 Serving {} mount(s) on http://{}", self.router.len(), local);
        for entry in self.router.mounts() {
            tracing::info!(
                "📂 {} -> {}{}",
                entry.mount.url_prefix,
                entry.mount.local_dir.display(),
                if entry.mount.readonly { " (readonly)" } else { "" }
            );
        }

        loop {
            let (stream, peer) = tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("🛑 Listener on {} stopped", local);
                    return Ok(());
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("Accept error: {}", e);
                        continue;
                    }
                },
            };

            let io = TokioIo::new(stream);
            let server = Arc::clone(&self);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, Infallible>(server.dispatch(req).await) }
                });
                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    tracing::debug!(peer = %peer, "Connection closed with error: {:?}", err);
                }
            });
        }
    }
}

/// Bind the listening socket
pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Server(format!("Failed to bind {}: {}", addr, e)))
}
