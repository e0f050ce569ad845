//! Routing engine, request/response protocol, and application wiring.
//!
//! This crate is the application-facing half of Strand. It consumes the
//! message contract defined in `strand-core` and provides:
//!
//! - **Value types** ([`datastructures`]): ordered header/query/cookie
//!   multimaps and the request URL, parsed lazily from the scope.
//!
//! - **Request façade** ([`request`]): cached views over the scope plus a
//!   single-consumption body state machine (`stream`/`body`/`json`/`form`).
//!
//! - **Response family** ([`response`]): basic, streaming, and file
//!   responses that serialize themselves as outbound frames, with an
//!   optional background task chain run after the terminal frame.
//!
//! - **Routing engine** ([`routing`]): path-template compilation, three-way
//!   match resolution, prefix mounts with scoped path rewriting, and the
//!   registration-order dispatch loop.
//!
//! - **Endpoints** ([`endpoint`]): stateful handler objects with
//!   per-HTTP-method entry points.
//!
//! - **Exception mapping** ([`exception`]): converts typed dispatch
//!   failures into responses via registered status-code handlers, and keeps
//!   the process alive on unanticipated faults.
//!
//! - **Application wiring** ([`app`]): the [`App`](app::App) type tying
//!   router, exception layer, and configuration together.
//!
//! # Architecture
//!
//! ```text
//! Scope + BodyReceiver
//!   -> App (Application impl)
//!     -> ExceptionLayer
//!       -> Router (registration-order walk, 404/405 resolution)
//!         -> Route / Mount (path rewrite scoped to the subtree)
//!           -> Handler (sync / async / endpoint object)
//!             -> Request facade ... returns Response
//!       <- Response frames (Start, Body*, terminal Body)
//!   <- background task chain (after the terminal frame)
//! ```

pub mod app;
pub mod background;
pub mod datastructures;
pub mod endpoint;
pub mod exception;
pub mod request;
pub mod response;
pub mod routing;

// Re-export key types for convenience.
pub use app::App;
pub use background::BackgroundTasks;
pub use datastructures::{Cookies, Headers, QueryParams, Url};
pub use endpoint::Endpoint;
pub use exception::{Error, ExceptionLayer, HttpError};
pub use request::{BodyError, BodyStream, Request};
pub use response::{Response, ResponseError};
pub use routing::{Handler, Mount, Route, RouteError, RouteMatch, Router};
