//! Stateful handler objects with per-HTTP-method entry points.

use http::Method;

use crate::exception::{Error, HttpError};
use crate::request::Request;
use crate::response::Response;

/// A handler object exposing one entry point per HTTP method.
///
/// [`dispatch`](Endpoint::dispatch) resolves the entry point matching the
/// incoming method. An entry point that is not overridden reports a typed
/// method-not-allowed failure — a method the route claims to allow but the
/// endpoint does not implement is surfaced, never silently dropped.
#[async_trait::async_trait]
pub trait Endpoint: Send + Sync {
    /// The method set registered for routes built from this endpoint.
    fn allowed_methods(&self) -> Vec<Method> {
        vec![Method::GET, Method::POST]
    }

    /// Handle a GET request.
    async fn get(&self, request: Request) -> Result<Response, Error> {
        let _ = request;
        Err(HttpError::method_not_allowed().into())
    }

    /// Handle a POST request.
    async fn post(&self, request: Request) -> Result<Response, Error> {
        let _ = request;
        Err(HttpError::method_not_allowed().into())
    }

    /// Handle a PUT request.
    async fn put(&self, request: Request) -> Result<Response, Error> {
        let _ = request;
        Err(HttpError::method_not_allowed().into())
    }

    /// Handle a DELETE request.
    async fn delete(&self, request: Request) -> Result<Response, Error> {
        let _ = request;
        Err(HttpError::method_not_allowed().into())
    }

    /// Handle a PATCH request.
    async fn patch(&self, request: Request) -> Result<Response, Error> {
        let _ = request;
        Err(HttpError::method_not_allowed().into())
    }

    /// Dispatch to the entry point matching the request method.
    async fn dispatch(&self, request: Request) -> Result<Response, Error> {
        match *request.method() {
            Method::GET => self.get(request).await,
            Method::POST => self.post(request).await,
            Method::PUT => self.put(request).await,
            Method::DELETE => self.delete(request).await,
            Method::PATCH => self.patch(request).await,
            _ => Err(HttpError::method_not_allowed().into()),
        }
    }
}
