//! Integration tests for the Strand toolkit.
//!
//! These tests play the transport's role: they deliver a scope plus body
//! frames to an [`Application`] over the message channels and collect the
//! outbound response frames, asserting the two-phase protocol shape
//! (exactly one start frame, body frames, a terminal frame) along the way.

use std::sync::Once;

use bytes::{Bytes, BytesMut};
use http::{Method, StatusCode};
use strand_core::{
    Address, Application, BodyFrame, ResponseFrame, Scope, body_channel, frame_channel,
};

static INIT: Once = Once::new();

/// Initialize tracing (once).
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .init();
    });
}

/// Build a scope the way a transport would, with an optional `?query`
/// suffix split off the path.
#[must_use]
pub fn test_scope(method: Method, path: &str) -> Scope {
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, query),
        None => (path, ""),
    };
    Scope::new(method, path)
        .with_query_string(query)
        .with_server(Address::new("testserver", None))
}

/// A collected response: status, headers, and the raw body frames.
#[derive(Debug)]
pub struct TestResponse {
    /// Status from the start frame.
    pub status: StatusCode,
    /// Headers from the start frame.
    pub headers: Vec<(String, String)>,
    /// Body frames in transmission order, `(bytes, more_body)`.
    pub body_frames: Vec<(Bytes, bool)>,
}

impl TestResponse {
    /// Look up a header by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The concatenated body bytes.
    #[must_use]
    pub fn body(&self) -> Bytes {
        let mut buf = BytesMut::new();
        for (chunk, _) in &self.body_frames {
            buf.extend_from_slice(chunk);
        }
        buf.freeze()
    }

    /// The body as UTF-8 text.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8(self.body().to_vec()).expect("body is not UTF-8")
    }

    /// The body parsed as JSON.
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body()).expect("body is not JSON")
    }
}

/// Drive one request through an application and collect the response,
/// asserting the frame protocol shape.
pub async fn perform(
    app: &dyn Application,
    scope: Scope,
    body_frames: Vec<BodyFrame>,
) -> TestResponse {
    init_tracing();

    let (body_tx, body_rx) = body_channel(body_frames.len().max(1));
    for frame in body_frames {
        body_tx.try_send(frame).expect("body channel capacity");
    }
    drop(body_tx);

    let (frame_tx, mut frame_rx) = frame_channel(256);
    app.call(scope, body_rx, frame_tx)
        .await
        .expect("application failed");

    let mut frames = Vec::new();
    while let Ok(frame) = frame_rx.try_recv() {
        frames.push(frame);
    }
    assemble(frames)
}

/// Perform a GET request with an empty body.
pub async fn get(app: &dyn Application, path: &str) -> TestResponse {
    perform(
        app,
        test_scope(Method::GET, path),
        vec![BodyFrame::last(Bytes::new())],
    )
    .await
}

/// Perform a POST request with the given body as a single terminal frame.
pub async fn post(app: &dyn Application, path: &str, body: impl Into<Bytes>) -> TestResponse {
    perform(
        app,
        test_scope(Method::POST, path),
        vec![BodyFrame::last(body.into())],
    )
    .await
}

/// Check the two-phase protocol shape and split the frames apart.
fn assemble(frames: Vec<ResponseFrame>) -> TestResponse {
    let mut iter = frames.into_iter();
    let Some(ResponseFrame::Start { status, headers }) = iter.next() else {
        panic!("first frame must be a start frame");
    };

    let mut body_frames = Vec::new();
    for frame in iter {
        match frame {
            ResponseFrame::Body { body, more_body } => body_frames.push((body, more_body)),
            ResponseFrame::Start { .. } => panic!("received a second start frame"),
        }
    }
    assert!(
        matches!(body_frames.last(), Some((_, false))),
        "response not terminated by a final body frame"
    );

    TestResponse {
        status,
        headers,
        body_frames,
    }
}

mod test_endpoints;
mod test_exceptions;
mod test_requests;
