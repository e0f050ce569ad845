//! The request/response message protocol.
//!
//! A transport delivers one [`Scope`] per request together with a pull-based
//! channel of inbound [`BodyFrame`]s, and consumes outbound
//! [`ResponseFrame`]s: exactly one `Start` frame followed by one or more
//! `Body` frames, terminated by a frame with `more_body: false`.
//!
//! ```text
//! transport -> Scope + BodyReceiver -> Application -> FrameSender -> transport
//! ```
//!
//! The channels are owned by exactly one logical flow per request: the body
//! receiver by whoever consumes the request stream, the frame sender by
//! whoever produces the response.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use http::{Method, StatusCode};
use tokio::sync::mpsc;

use crate::error::{StrandError, StrandResult};

/// Transport address: host plus optional port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Host name or IP literal.
    pub host: String,
    /// Port, if the transport knows one.
    pub port: Option<u16>,
}

impl Address {
    /// Create an address from a host and optional port.
    #[must_use]
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// One request's static attributes, delivered once per inbound message.
///
/// The routing engine threads scopes functionally: matching a route or
/// mount produces an updated *copy* (accumulated `path_params`, rewritten
/// `path` for mounted subtrees) while siblings continue to observe the
/// original. Application code may stash arbitrary per-request values in
/// [`state`](Scope::state).
#[derive(Debug, Clone)]
pub struct Scope {
    /// HTTP method token.
    pub method: Method,
    /// Request path as seen by the current routing level. Mount dispatch
    /// rewrites this to the unmatched suffix for its subtree.
    pub path: String,
    /// Original request path as received from the transport, still
    /// percent-encoded.
    pub raw_path: String,
    /// Raw query string (no leading `?`).
    pub query_string: String,
    /// URL scheme reported by the transport (`http` or `https`).
    pub scheme: String,
    /// Server address the request arrived on.
    pub server: Option<Address>,
    /// Raw header pairs in wire order, names as received.
    pub headers: Vec<(String, String)>,
    /// Path parameters accumulated by the routing engine.
    pub path_params: HashMap<String, String>,
    /// Arbitrary per-request application state.
    pub state: HashMap<String, serde_json::Value>,
}

impl Scope {
    /// Create a scope with the given method and path; all other fields
    /// take neutral defaults.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            method,
            raw_path: path.clone(),
            path,
            query_string: String::new(),
            scheme: "http".to_owned(),
            server: None,
            headers: Vec::new(),
            path_params: HashMap::new(),
            state: HashMap::new(),
        }
    }

    /// Return a copy with the effective path replaced (used by mounts to
    /// scope a rewrite to their subtree).
    #[must_use]
    pub fn with_path(&self, path: impl Into<String>) -> Self {
        let mut scope = self.clone();
        scope.path = path.into();
        scope
    }

    /// Return a copy with additional path parameters merged in.
    #[must_use]
    pub fn with_path_params<I>(&self, params: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut scope = self.clone();
        scope.path_params.extend(params);
        scope
    }

    /// Set the query string (builder style).
    #[must_use]
    pub fn with_query_string(mut self, query: impl Into<String>) -> Self {
        self.query_string = query.into();
        self
    }

    /// Set the scheme (builder style).
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Set the server address (builder style).
    #[must_use]
    pub fn with_server(mut self, address: Address) -> Self {
        self.server = Some(address);
        self
    }

    /// Append a raw header pair (builder style).
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// One inbound frame of the request body protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyFrame {
    /// A chunk of body bytes. `more_body: false` marks the final chunk.
    Data {
        /// Payload bytes (may be empty, e.g. for a bare terminal frame).
        body: Bytes,
        /// Whether further frames follow.
        more_body: bool,
    },
    /// The client disconnected before the body completed.
    Disconnect,
}

impl BodyFrame {
    /// A non-terminal data frame.
    #[must_use]
    pub fn data(body: impl Into<Bytes>) -> Self {
        Self::Data {
            body: body.into(),
            more_body: true,
        }
    }

    /// A terminal data frame.
    #[must_use]
    pub fn last(body: impl Into<Bytes>) -> Self {
        Self::Data {
            body: body.into(),
            more_body: false,
        }
    }
}

/// One outbound frame of the response protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseFrame {
    /// Status and headers. Sent exactly once, before any body frame.
    Start {
        /// Response status code.
        status: StatusCode,
        /// Header pairs, names lower-cased.
        headers: Vec<(String, String)>,
    },
    /// A chunk of response body. `more_body: false` terminates the response.
    Body {
        /// Payload bytes.
        body: Bytes,
        /// Whether further frames follow.
        more_body: bool,
    },
}

/// Receiving half of the inbound body channel.
pub type BodyReceiver = mpsc::Receiver<BodyFrame>;

/// Sending half of the inbound body channel (held by the transport).
pub type BodySender = mpsc::Sender<BodyFrame>;

/// Receiving half of the outbound frame channel (held by the transport).
pub type FrameReceiver = mpsc::Receiver<ResponseFrame>;

/// Create the inbound body channel with the given capacity.
#[must_use]
pub fn body_channel(capacity: usize) -> (BodySender, BodyReceiver) {
    mpsc::channel(capacity)
}

/// Sending half of the outbound frame channel.
///
/// Tracks whether the `Start` frame has been transmitted: once it has,
/// response headers are committed and no second response may begin on this
/// channel. The exception-mapping layer consults
/// [`response_started`](FrameSender::response_started) before rendering a
/// failure.
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<ResponseFrame>,
    started: Arc<AtomicBool>,
}

impl FrameSender {
    /// Send one frame to the transport.
    ///
    /// # Errors
    ///
    /// Returns [`StrandError::ChannelClosed`] if the transport dropped its
    /// end; the caller must abort remaining frame writes.
    pub async fn send(&self, frame: ResponseFrame) -> StrandResult<()> {
        let is_start = matches!(frame, ResponseFrame::Start { .. });
        self.tx
            .send(frame)
            .await
            .map_err(|_| StrandError::ChannelClosed)?;
        if is_start {
            self.started.store(true, Ordering::Release);
        }
        Ok(())
    }

    /// Whether the `Start` frame has already been accepted by the transport.
    #[must_use]
    pub fn response_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

/// Create the outbound frame channel with the given capacity.
#[must_use]
pub fn frame_channel(capacity: usize) -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        FrameSender {
            tx,
            started: Arc::new(AtomicBool::new(false)),
        },
        rx,
    )
}

/// The application side of the message contract.
///
/// Anything that can consume a scope plus body frames and produce response
/// frames is an application: the router, a fully wired app, or an opaque
/// sub-application delegated to by a mount.
#[async_trait::async_trait]
pub trait Application: Send + Sync {
    /// Handle one request delivered over the message channels.
    async fn call(
        &self,
        scope: Scope,
        receive: BodyReceiver,
        send: FrameSender,
    ) -> anyhow::Result<()>;
}
