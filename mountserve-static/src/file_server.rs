//! Content server for one mount
//!
//! Maps a mount-relative path to a full body, a single byte range, a
//! directory listing or a redirect. File bodies are streamed in chunks from
//! pooled buffers and stop as soon as the server's cancellation token fires.

use crate::error::{FsError, FsResult};
use crate::fs::{FileHandle, FileInfo, FileSystem, MountFs};
use crate::listing;
use crate::mime::content_type;
use crate::pool::{BufferPool, PooledBuf};
use crate::range::{negotiate, unsatisfiable_content_range, ByteRange, RangeDecision};
use bytes::Bytes;
use futures::stream::{self, BoxStream};
use http::StatusCode;
use std::io::{self, SeekFrom};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;

/// Streamed response body
pub type ByteStream = BoxStream<'static, io::Result<Bytes>>;

/// Directory and streaming behaviour of a mount
#[derive(Debug, Clone)]
pub struct FileServerConfig {
    /// Index files to look for, in order
    pub index: Vec<String>,
    /// Render a listing when no index file exists
    pub browse: bool,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            index: vec!["index.html".to_string()],
            browse: true,
        }
    }
}

/// A content request, already routed to this mount
#[derive(Debug, Clone, Copy)]
pub struct ContentRequest<'a> {
    /// Path relative to the mount, always starting with `/`
    pub path: &'a str,
    /// Full decoded request path, used for the trailing slash check and
    /// listing titles
    pub url_path: &'a str,
    /// Raw `Range` header, if any
    pub range: Option<&'a str>,
}

/// Outcome of serving a content request
pub enum Served {
    /// A file body, partial body or 416
    File(ServedFile),
    /// Rendered HTML listing for a directory
    Listing(String),
    /// Directory requested without a trailing slash
    DirectoryRedirect,
}

/// Status, headers and body for a file response
pub struct ServedFile {
    pub status: StatusCode,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub content_range: Option<String>,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub body: Option<ByteStream>,
}

impl std::fmt::Debug for ServedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServedFile")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .finish_non_exhaustive()
    }
}

impl ServedFile {
    /// Response headers in the order they should be written
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::with_capacity(7);
        if self.status != StatusCode::RANGE_NOT_SATISFIABLE {
            headers.push(("Accept-Ranges", "bytes".to_string()));
            headers.push(("Content-Type", self.content_type.clone()));
        }
        if let Some(length) = self.content_length {
            headers.push(("Content-Length", length.to_string()));
        }
        if let Some(range) = &self.content_range {
            headers.push(("Content-Range", range.clone()));
        }
        if let Some(modified) = &self.last_modified {
            headers.push(("Last-Modified", modified.clone()));
        }
        if let Some(etag) = &self.etag {
            headers.push(("ETag", etag.clone()));
        }
        headers
    }
}

/// Entity tag built from size and modification time
pub fn etag(info: &FileInfo) -> String {
    let mtime = info
        .mod_time
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("\"{:x}-{:x}\"", info.size, mtime)
}

fn last_modified(info: &FileInfo) -> Option<String> {
    info.mod_time.map(|t: SystemTime| httpdate::fmt_http_date(t))
}

/// Serves files of one mount
#[derive(Debug, Clone)]
pub struct FileServer {
    fs: MountFs,
    config: FileServerConfig,
    pool: BufferPool,
    cancel: CancellationToken,
}

impl FileServer {
    pub fn new(fs: MountFs, config: FileServerConfig, pool: BufferPool, cancel: CancellationToken) -> Self {
        Self {
            fs,
            config,
            pool,
            cancel,
        }
    }

    /// The filesystem behind this mount
    pub fn fs(&self) -> &MountFs {
        &self.fs
    }

    /// Serve a content request
    pub async fn serve(&self, req: ContentRequest<'_>) -> FsResult<Served> {
        tracing::debug!("📁 Serving request: {}", req.path);

        let info = self.fs.stat(req.path).await?;
        if !info.is_dir {
            let handle = self.fs.open(req.path).await?;
            return self.serve_file(handle, req.range).await.map(Served::File);
        }

        // A mount root reached as `/prefix` has the relative path `/`,
        // so the slash check runs on the full request path
        if !req.url_path.ends_with('/') {
            return Ok(Served::DirectoryRedirect);
        }

        for index in &self.config.index {
            let candidate = format!("{}{}", req.path, index);
            match self.fs.stat(&candidate).await {
                Ok(found) if !found.is_dir => {
                    let handle = self.fs.open(&candidate).await?;
                    return self.serve_file(handle, req.range).await.map(Served::File);
                }
                Ok(_) | Err(FsError::NotFound) => {}
                Err(e) => return Err(e),
            }
        }

        if !self.config.browse {
            return Err(FsError::NotFound);
        }
        let entries = self.fs.read_dir(req.path).await?;
        Ok(Served::Listing(listing::render(req.url_path, entries)))
    }

    /// Build the response for an opened file
    pub async fn serve_file(&self, handle: FileHandle, range: Option<&str>) -> FsResult<ServedFile> {
        let FileHandle {
            mut file,
            info,
            seekable,
        } = handle;
        let size = info.size;

        let mut served = ServedFile {
            status: StatusCode::OK,
            content_type: content_type(&info.name),
            content_length: seekable.then_some(size),
            content_range: None,
            last_modified: last_modified(&info),
            etag: seekable.then(|| etag(&info)),
            body: None,
        };

        let decision = if seekable {
            negotiate(range, size)
        } else {
            if range.is_some() {
                tracing::debug!(name = %info.name, "Source not seekable, serving full content");
            }
            RangeDecision::Full
        };

        match decision {
            RangeDecision::Full => {
                let limit = seekable.then_some(size);
                served.body = Some(self.stream(file, limit));
            }
            RangeDecision::Partial(ByteRange { start, end, length }) => {
                file.seek(SeekFrom::Start(start))
                    .await
                    .map_err(FsError::FileAccess)?;
                served.status = StatusCode::PARTIAL_CONTENT;
                served.content_length = Some(length);
                served.content_range = Some(ByteRange { start, end, length }.content_range(size));
                served.body = Some(self.stream(file, Some(length)));
            }
            RangeDecision::Unsatisfiable => {
                served.status = StatusCode::RANGE_NOT_SATISFIABLE;
                served.content_length = Some(0);
                served.content_range = Some(unsatisfiable_content_range(size));
            }
        }

        Ok(served)
    }

    fn stream(&self, file: File, limit: Option<u64>) -> ByteStream {
        body_stream(file, limit, self.pool.get(), self.cancel.child_token())
    }
}

struct BodyState {
    file: File,
    remaining: Option<u64>,
    buf: PooledBuf,
    cancel: CancellationToken,
    done: bool,
}

/// Stream at most `limit` bytes of `file`, or all of it when `limit` is `None`
///
/// A file that ends before `limit` yields an `UnexpectedEof` error so the
/// connection is dropped instead of sending a short body.
pub fn body_stream(
    file: File,
    limit: Option<u64>,
    buf: PooledBuf,
    cancel: CancellationToken,
) -> ByteStream {
    let state = BodyState {
        file,
        remaining: limit,
        buf,
        cancel,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        if st.done || st.remaining == Some(0) {
            return None;
        }
        if st.cancel.is_cancelled() {
            tracing::debug!("Transfer cancelled");
            return None;
        }

        let want = match st.remaining {
            Some(remaining) => remaining.min(st.buf.len() as u64) as usize,
            None => st.buf.len(),
        };

        let read = tokio::select! {
            _ = st.cancel.cancelled() => {
                tracing::debug!("Transfer cancelled");
                return None;
            }
            read = st.file.read(&mut st.buf[..want]) => read,
        };

        match read {
            Ok(0) if st.remaining.is_some() => {
                st.done = true;
                Some((
                    Err(io::Error::new(io::ErrorKind::UnexpectedEof, "file shrank while serving")),
                    st,
                ))
            }
            Ok(0) => None,
            Ok(n) => {
                let chunk = Bytes::copy_from_slice(&st.buf[..n]);
                if let Some(remaining) = st.remaining.as_mut() {
                    *remaining -= n as u64;
                }
                Some((Ok(chunk), st))
            }
            Err(e) => {
                st.done = true;
                Some((Err(e), st))
            }
        }
    }))
}
