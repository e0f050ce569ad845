//! Exception-to-response mapping.
//!
//! Typed dispatch failures ([`HttpError`]: status code + message) raised
//! anywhere during route resolution or handler execution are intercepted by
//! [`ExceptionLayer`]: a handler registered for that exact status code
//! produces the response, otherwise a generic JSON renderer does. Any other
//! failure is rendered as a diagnostic response so the process keeps
//! serving; with `debug` off the diagnostic body is generic (the
//! production-filter seam).

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use http::StatusCode;
use strand_core::{BodyReceiver, FrameSender, Scope};

use crate::request::{BodyError, Request};
use crate::response::{Response, ResponseError};
use crate::routing::Router;

/// A typed dispatch failure carrying the status code to surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    /// Status code reported to the client.
    pub status: StatusCode,
    /// Human-readable failure message.
    pub message: String,
}

impl HttpError {
    /// Create a dispatch failure with an explicit status and message.
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// No route structurally matched the request path.
    #[must_use]
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "no route matched the request path")
    }

    /// A route matched the path but not the request method.
    #[must_use]
    pub fn method_not_allowed() -> Self {
        Self::new(
            StatusCode::METHOD_NOT_ALLOWED,
            "a route matched the path but not the method",
        )
    }
}

/// Everything that can go wrong while dispatching a request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Typed routing/dispatch failure, always surfaced to the client.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Body/channel protocol failure.
    #[error(transparent)]
    Body(#[from] BodyError),

    /// Response construction or transmission failure.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// Unanticipated failure (programming error), rendered as a diagnostic
    /// response.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// A response-producing callback registered for one failure status code.
pub type ExceptionHandler =
    Arc<dyn Fn(Request, HttpError) -> BoxFuture<'static, Result<Response, Error>> + Send + Sync>;

/// Wraps the router and converts dispatch failures into terminal responses.
pub struct ExceptionLayer {
    handlers: HashMap<StatusCode, ExceptionHandler>,
    debug: bool,
}

impl std::fmt::Debug for ExceptionLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExceptionLayer")
            .field("handlers", &self.handlers.len())
            .field("debug", &self.debug)
            .finish()
    }
}

impl Default for ExceptionLayer {
    fn default() -> Self {
        Self::new(false)
    }
}

impl ExceptionLayer {
    /// Create a layer with no registered handlers.
    #[must_use]
    pub fn new(debug: bool) -> Self {
        Self {
            handlers: HashMap::new(),
            debug,
        }
    }

    /// Enable or disable diagnostic detail in untyped-failure responses.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Register a handler for one failure status code.
    pub fn register<F, Fut>(&mut self, status: StatusCode, handler: F)
    where
        F: Fn(Request, HttpError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Error>> + Send + 'static,
    {
        self.handlers
            .insert(status, Arc::new(move |request, error| {
                Box::pin(handler(request, error))
            }));
    }

    /// Dispatch through the router, mapping failures to responses.
    ///
    /// # Errors
    ///
    /// Propagates transport-level failures (dropped channels, failures
    /// after transmission started); everything else becomes a response.
    pub async fn call(
        &self,
        router: &Router,
        scope: Scope,
        receive: BodyReceiver,
        send: FrameSender,
    ) -> anyhow::Result<()> {
        // Kept aside for the failure path: exception handlers receive a
        // request over the original scope (without the consumed body).
        let error_scope = scope.clone();

        match router.dispatch(scope, receive, send.clone()).await {
            Ok(()) => Ok(()),
            Err(error) => self.handle_error(error, error_scope, &send).await,
        }
    }

    async fn handle_error(
        &self,
        error: Error,
        scope: Scope,
        send: &FrameSender,
    ) -> anyhow::Result<()> {
        let error = unwrap_opaque(error);

        if send.response_started() {
            tracing::error!(%error, "failure after response transmission started; aborting");
            return Err(anyhow::Error::new(error));
        }

        let response = match &error {
            Error::Http(http_error) => {
                tracing::warn!(
                    status = %http_error.status,
                    message = %http_error.message,
                    "dispatch failure"
                );
                let produced = match self.handlers.get(&http_error.status) {
                    Some(handler) => {
                        let request = Request::without_body(scope);
                        handler(request, http_error.clone()).await
                    }
                    None => default_http_response(http_error).map_err(Error::from),
                };
                match produced {
                    Ok(response) => response,
                    Err(handler_error) => {
                        tracing::error!(error = %handler_error, "exception handler failed");
                        self.diagnostic_response(&handler_error)
                    }
                }
            }
            _ => {
                tracing::error!(%error, "unanticipated dispatch failure");
                self.diagnostic_response(&error)
            }
        };

        response.send(send).await.map_err(anyhow::Error::new)?;
        Ok(())
    }

    /// Render an untyped failure. With `debug` the body carries the failure
    /// description; otherwise a generic body.
    fn diagnostic_response(&self, error: &Error) -> Response {
        let body = if self.debug {
            format!("{error:?}")
        } else {
            "Internal Server Error".to_owned()
        };
        Response::plain_text(body).with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Recover typed failures smuggled through the opaque-application boundary.
fn unwrap_opaque(error: Error) -> Error {
    match error {
        Error::Internal(any) => match any.downcast::<HttpError>() {
            Ok(http_error) => Error::Http(http_error),
            Err(any) => match any.downcast::<Error>() {
                Ok(inner) => unwrap_opaque(inner),
                Err(any) => Error::Internal(any),
            },
        },
        other => other,
    }
}

/// The generic renderer for typed failures with no registered handler.
fn default_http_response(error: &HttpError) -> Result<Response, ResponseError> {
    Ok(Response::json(&serde_json::json!({
        "status": error.status.as_u16(),
        "detail": error.message,
    }))?
    .with_status(error.status))
}
