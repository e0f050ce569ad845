//! The request façade: cached views over the scope plus the body protocol.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::OnceLock;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use http::Method;
use serde::de::DeserializeOwned;
use strand_core::{BodyFrame, BodyReceiver, Scope};

use crate::datastructures::{Cookies, Headers, QueryParams, Url};

/// Failures of the request body protocol.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    /// The transport signaled disconnection mid-read, or dropped the body
    /// channel before the final frame.
    #[error("client disconnected while streaming the request body")]
    ClientDisconnect,

    /// The request carries no body channel (e.g. one rebuilt for an
    /// exception handler).
    #[error("no body channel attached to this request")]
    ChannelUnavailable,

    /// The body stream was already handed out and cannot be re-read.
    #[error("request body stream already consumed")]
    AlreadyConsumed,

    /// The body is not valid JSON.
    #[error("malformed JSON body")]
    Json(#[source] serde_json::Error),

    /// The form body is not valid UTF-8.
    #[error("form body is not valid UTF-8")]
    Utf8(#[source] std::str::Utf8Error),
}

/// Consumption state of the request body channel.
#[derive(Debug)]
enum BodyState {
    /// No one has touched the body yet.
    Unread,
    /// The stream has been handed out; the channel is owned elsewhere.
    Streaming,
    /// The body was fully drained and cached.
    Drained(Bytes),
}

/// Lazy façade over an inbound message.
///
/// Derived views (`headers`, `query_params`, `cookies`, `url`) are computed
/// on first access and cached; computing them is pure given the immutable
/// scope. The body is a single-consumption stream: see [`stream`](Self::stream)
/// and [`body`](Self::body) for the exact replay/reuse rules.
#[derive(Debug)]
pub struct Request {
    scope: Scope,
    receiver: Option<BodyReceiver>,
    body_state: BodyState,
    headers: OnceLock<Headers>,
    query_params: OnceLock<QueryParams>,
    cookies: OnceLock<Cookies>,
    url: OnceLock<Url>,
}

impl Request {
    /// Build a request over a scope and its body channel.
    #[must_use]
    pub fn new(scope: Scope, receive: BodyReceiver) -> Self {
        Self {
            scope,
            receiver: Some(receive),
            body_state: BodyState::Unread,
            headers: OnceLock::new(),
            query_params: OnceLock::new(),
            cookies: OnceLock::new(),
            url: OnceLock::new(),
        }
    }

    /// Build a request with no body channel (body access fails with
    /// [`BodyError::ChannelUnavailable`]).
    #[must_use]
    pub fn without_body(scope: Scope) -> Self {
        Self {
            scope,
            receiver: None,
            body_state: BodyState::Unread,
            headers: OnceLock::new(),
            query_params: OnceLock::new(),
            cookies: OnceLock::new(),
            url: OnceLock::new(),
        }
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.scope.method
    }

    /// Request path as seen by the routing level that dispatched here.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.scope.path
    }

    /// Path parameters captured by the routing engine.
    #[must_use]
    pub fn path_params(&self) -> &HashMap<String, String> {
        &self.scope.path_params
    }

    /// A single path parameter by name.
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.scope.path_params.get(name).map(String::as_str)
    }

    /// The underlying scope.
    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Per-request application state.
    #[must_use]
    pub fn state(&self) -> &HashMap<String, serde_json::Value> {
        &self.scope.state
    }

    /// Mutable per-request application state.
    pub fn state_mut(&mut self) -> &mut HashMap<String, serde_json::Value> {
        &mut self.scope.state
    }

    /// Header multimap, parsed on first access.
    #[must_use]
    pub fn headers(&self) -> &Headers {
        self.headers
            .get_or_init(|| Headers::from_raw(&self.scope.headers))
    }

    /// Query parameters, parsed on first access.
    #[must_use]
    pub fn query_params(&self) -> &QueryParams {
        self.query_params
            .get_or_init(|| QueryParams::parse(&self.scope.query_string))
    }

    /// Cookies, parsed on first access.
    #[must_use]
    pub fn cookies(&self) -> &Cookies {
        self.cookies.get_or_init(|| Cookies::parse(self.headers()))
    }

    /// Request URL, assembled on first access.
    #[must_use]
    pub fn url(&self) -> &Url {
        self.url.get_or_init(|| Url::from_scope(&self.scope))
    }

    /// Take the body as a lazy, single-pass stream of chunks.
    ///
    /// Each pull reads one frame from the body channel; the frame flagged
    /// final ends the stream, and a disconnect frame fails it with
    /// [`BodyError::ClientDisconnect`]. If the body was already fully
    /// materialized by [`body`](Self::body), the cached bytes are replayed
    /// as a one-chunk stream instead of re-reading the channel.
    ///
    /// # Errors
    ///
    /// [`BodyError::AlreadyConsumed`] if the stream was already handed out,
    /// [`BodyError::ChannelUnavailable`] if the request has no body channel.
    pub fn stream(&mut self) -> Result<BodyStream, BodyError> {
        match &self.body_state {
            BodyState::Drained(bytes) => Ok(BodyStream::replay(bytes.clone())),
            BodyState::Streaming => Err(BodyError::AlreadyConsumed),
            BodyState::Unread => {
                let receiver = self
                    .receiver
                    .take()
                    .ok_or(BodyError::ChannelUnavailable)?;
                self.body_state = BodyState::Streaming;
                Ok(BodyStream::channel(receiver))
            }
        }
    }

    /// Drain the body once and cache the concatenated bytes.
    ///
    /// Repeat calls return the cache without touching the channel.
    ///
    /// # Errors
    ///
    /// Propagates the stream errors of [`stream`](Self::stream), including
    /// [`BodyError::AlreadyConsumed`] if the stream was handed out and
    /// never materialized here.
    pub async fn body(&mut self) -> Result<Bytes, BodyError> {
        if let BodyState::Drained(bytes) = &self.body_state {
            return Ok(bytes.clone());
        }

        let mut stream = self.stream()?;
        let mut buf = BytesMut::new();
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }

        let bytes = buf.freeze();
        self.body_state = BodyState::Drained(bytes.clone());
        Ok(bytes)
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// [`BodyError::Json`] on malformed input; body errors as for
    /// [`body`](Self::body). Does not re-read the channel once the body is
    /// cached.
    pub async fn json<T: DeserializeOwned>(&mut self) -> Result<T, BodyError> {
        let body = self.body().await?;
        serde_json::from_slice(&body).map_err(BodyError::Json)
    }

    /// Decode the body as `application/x-www-form-urlencoded` pairs.
    ///
    /// # Errors
    ///
    /// [`BodyError::Utf8`] if the body is not UTF-8; body errors as for
    /// [`body`](Self::body).
    pub async fn form(&mut self) -> Result<QueryParams, BodyError> {
        let body = self.body().await?;
        let text = std::str::from_utf8(&body).map_err(BodyError::Utf8)?;
        Ok(QueryParams::parse(text))
    }
}

/// A lazy, single-pass stream of request body chunks.
#[derive(Debug)]
pub struct BodyStream {
    inner: BodyStreamInner,
}

#[derive(Debug)]
enum BodyStreamInner {
    /// Replays an already-cached body as a single chunk.
    Replay(Option<Bytes>),
    /// Pulls frames from the live body channel.
    Channel { receiver: BodyReceiver, done: bool },
}

impl BodyStream {
    fn replay(bytes: Bytes) -> Self {
        Self {
            inner: BodyStreamInner::Replay(Some(bytes)),
        }
    }

    fn channel(receiver: BodyReceiver) -> Self {
        Self {
            inner: BodyStreamInner::Channel {
                receiver,
                done: false,
            },
        }
    }
}

impl Stream for BodyStream {
    type Item = Result<Bytes, BodyError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match &mut self.get_mut().inner {
            BodyStreamInner::Replay(slot) => Poll::Ready(slot.take().map(Ok)),
            BodyStreamInner::Channel { receiver, done } => {
                if *done {
                    return Poll::Ready(None);
                }
                match receiver.poll_recv(cx) {
                    Poll::Pending => Poll::Pending,
                    Poll::Ready(Some(BodyFrame::Data { body, more_body })) => {
                        if !more_body {
                            *done = true;
                        }
                        Poll::Ready(Some(Ok(body)))
                    }
                    Poll::Ready(Some(BodyFrame::Disconnect)) | Poll::Ready(None) => {
                        *done = true;
                        Poll::Ready(Some(Err(BodyError::ClientDisconnect)))
                    }
                }
            }
        }
    }
}
