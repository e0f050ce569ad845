//! The response family: basic, streaming, and file responses.
//!
//! A response serializes itself as outbound frames: exactly one `Start`
//! frame (status + headers), then body frames, terminated by a frame with
//! `more_body: false`. Headers are mutable until [`send`](Response::send)
//! consumes the response; after the start frame is on the wire they are
//! committed.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use http::StatusCode;
use md5::{Digest, Md5};
use serde::Serialize;
use strand_core::{FrameSender, ResponseFrame, StrandError};

use crate::background::BackgroundTasks;
use crate::datastructures::Headers;

/// Failures while constructing or transmitting a response.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    /// The file behind a file response does not exist.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The path behind a file response is not a regular file.
    #[error("not a regular file: {0}")]
    NotAFile(String),

    /// Any other I/O failure while reading the file.
    #[error("i/o error on {path}")]
    Io {
        /// Path being read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization of the response content failed.
    #[error("JSON serialization failed")]
    Json(#[source] serde_json::Error),

    /// The transport dropped the frame channel mid-response.
    #[error(transparent)]
    Channel(#[from] StrandError),
}

/// The content source of a response.
enum Content {
    /// In-memory payload, sent as a single terminal frame.
    Full(Bytes),
    /// Produced item by item; each item becomes one non-terminal frame.
    Stream(BoxStream<'static, Bytes>),
    /// Read from disk at send time.
    File {
        /// File to serve.
        path: PathBuf,
        /// Download filename for `Content-Disposition: attachment`.
        filename: Option<String>,
    },
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::File { path, filename } => f
                .debug_struct("File")
                .field("path", path)
                .field("filename", filename)
                .finish(),
        }
    }
}

/// An outbound response: status, headers, content source, and an optional
/// background task chain run after the terminal frame.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    media_type: Option<mime::Mime>,
    content: Content,
    background: Option<BackgroundTasks>,
}

impl Response {
    fn with_content(content: Content, media_type: Option<mime::Mime>) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Headers::new(),
            media_type,
            content,
            background: None,
        }
    }

    /// An in-memory response with an explicit media type.
    #[must_use]
    pub fn content(content: impl Into<Bytes>, media_type: mime::Mime) -> Self {
        Self::with_content(Content::Full(content.into()), Some(media_type))
    }

    /// A `text/html` response.
    #[must_use]
    pub fn html(content: impl Into<String>) -> Self {
        Self::with_content(
            Content::Full(Bytes::from(content.into())),
            Some(mime::TEXT_HTML_UTF_8),
        )
    }

    /// A `text/plain` response.
    #[must_use]
    pub fn plain_text(content: impl Into<String>) -> Self {
        Self::with_content(
            Content::Full(Bytes::from(content.into())),
            Some(mime::TEXT_PLAIN_UTF_8),
        )
    }

    /// An `application/json` response serialized from `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ResponseError::Json`] if serialization fails.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ResponseError> {
        let body = serde_json::to_vec(value).map_err(ResponseError::Json)?;
        Ok(Self::with_content(
            Content::Full(Bytes::from(body)),
            Some(mime::APPLICATION_JSON),
        ))
    }

    /// A streaming response: one frame per item pulled from `stream`.
    ///
    /// Items are sent as they are produced, preserving order and the
    /// producer's own pacing; nothing is buffered ahead. String items are
    /// encoded to bytes.
    #[must_use]
    pub fn streaming<S, T>(stream: S, media_type: mime::Mime) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
        T: Into<Bytes> + 'static,
    {
        Self::with_content(Content::Stream(stream.map(Into::into).boxed()), Some(media_type))
    }

    /// A file response. The file is read at send time; `Content-Length`,
    /// `ETag`, and `Last-Modified` are computed from its content and
    /// metadata.
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::with_content(
            Content::File {
                path: path.into(),
                filename: None,
            },
            None,
        )
    }

    /// Set the download filename, adding `Content-Disposition: attachment`.
    /// No effect on non-file responses.
    #[must_use]
    pub fn with_filename(mut self, name: impl Into<String>) -> Self {
        if let Content::File { filename, .. } = &mut self.content {
            *filename = Some(name.into());
        }
        self
    }

    /// Set the status code.
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Override the media type used for the `Content-Type` default.
    #[must_use]
    pub fn with_media_type(mut self, media_type: mime::Mime) -> Self {
        self.media_type = Some(media_type);
        self
    }

    /// Set a header, replacing previous values of the same name.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(name, value);
        self
    }

    /// Append a header, preserving previous values of the same name.
    #[must_use]
    pub fn append_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Attach a background task chain, run after the terminal frame.
    #[must_use]
    pub fn with_background(mut self, background: BackgroundTasks) -> Self {
        self.background = Some(background);
        self
    }

    /// Response status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers (mutable until the response is sent).
    #[must_use]
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Mutable access to the response headers.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Serialize this response as outbound frames, then run the background
    /// chain.
    ///
    /// Consuming `self` is what makes headers immutable once transmission
    /// starts.
    ///
    /// # Errors
    ///
    /// File responses surface [`ResponseError::FileNotFound`] and
    /// [`ResponseError::NotAFile`] before any frame is sent. A transport
    /// that drops the channel aborts remaining writes (and the background
    /// chain) with [`ResponseError::Channel`].
    pub async fn send(self, send: &FrameSender) -> Result<(), ResponseError> {
        let Self {
            status,
            mut headers,
            media_type,
            content,
            background,
        } = self;

        match content {
            Content::Full(body) => {
                apply_content_type(&mut headers, media_type);
                send_start(send, status, &headers).await?;
                send_body(send, body, false).await?;
            }
            Content::Stream(mut stream) => {
                apply_content_type(&mut headers, media_type);
                send_start(send, status, &headers).await?;
                while let Some(chunk) = stream.next().await {
                    send_body(send, chunk, true).await?;
                }
                send_body(send, Bytes::new(), false).await?;
            }
            Content::File { path, filename } => {
                let metadata = tokio::fs::metadata(&path)
                    .await
                    .map_err(|e| file_error(&path, e))?;
                if !metadata.is_file() {
                    return Err(ResponseError::NotAFile(path.display().to_string()));
                }
                let content = tokio::fs::read(&path)
                    .await
                    .map_err(|e| file_error(&path, e))?;

                headers.set("content-length", content.len().to_string());
                headers.set("etag", hex::encode(Md5::digest(&content)));
                if let Ok(modified) = metadata.modified() {
                    let modified: chrono::DateTime<chrono::Utc> = modified.into();
                    headers.set(
                        "last-modified",
                        modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
                    );
                }
                if let Some(name) = &filename {
                    headers.set(
                        "content-disposition",
                        format!("attachment; filename=\"{name}\""),
                    );
                }
                let media_type =
                    media_type.unwrap_or_else(|| guess_media_type(&path, filename.as_deref()));
                apply_content_type(&mut headers, Some(media_type));

                send_start(send, status, &headers).await?;
                send_body(send, Bytes::from(content), false).await?;
            }
        }

        if let Some(background) = background {
            background.run().await;
        }

        Ok(())
    }
}

/// Default the `Content-Type` header from the media type unless an explicit
/// header was already set.
fn apply_content_type(headers: &mut Headers, media_type: Option<mime::Mime>) {
    if !headers.contains("content-type") {
        let media_type = media_type.unwrap_or(mime::APPLICATION_OCTET_STREAM);
        headers.set("content-type", media_type.to_string());
    }
}

async fn send_start(
    send: &FrameSender,
    status: StatusCode,
    headers: &Headers,
) -> Result<(), ResponseError> {
    send.send(ResponseFrame::Start {
        status,
        headers: headers.to_raw(),
    })
    .await?;
    Ok(())
}

async fn send_body(send: &FrameSender, body: Bytes, more_body: bool) -> Result<(), ResponseError> {
    send.send(ResponseFrame::Body { body, more_body }).await?;
    Ok(())
}

/// Map a file I/O error to the response error taxonomy.
fn file_error(path: &Path, error: std::io::Error) -> ResponseError {
    if error.kind() == std::io::ErrorKind::NotFound {
        ResponseError::FileNotFound(path.display().to_string())
    } else {
        ResponseError::Io {
            path: path.display().to_string(),
            source: error,
        }
    }
}

/// Guess a media type from the download filename (preferred) or the file
/// path extension.
fn guess_media_type(path: &Path, filename: Option<&str>) -> mime::Mime {
    let extension = filename
        .map(Path::new)
        .unwrap_or(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("html" | "htm") => mime::TEXT_HTML,
        Some("txt") => mime::TEXT_PLAIN,
        Some("json") => mime::APPLICATION_JSON,
        Some("css") => mime::TEXT_CSS,
        Some("js") => mime::TEXT_JAVASCRIPT,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        Some("gif") => mime::IMAGE_GIF,
        Some("svg") => mime::IMAGE_SVG,
        Some("pdf") => mime::APPLICATION_PDF,
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}
