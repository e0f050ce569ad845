//! The routing engine: path compilation, match resolution, and dispatch.
//!
//! Path templates use `{name}` placeholders, each matching one run of
//! characters excluding `/` and captured as a named group. Templates and
//! incoming paths are both normalized to begin and end with `/`, so
//! `/users` and `/users/` are the same route.
//!
//! Testing one route against one request yields exactly one of the three
//! [`RouteMatch`] outcomes. The router walks its table in registration
//! order; the first full match wins. If the walk completes with no full
//! match, the router raises a typed 405 if any entry matched structurally
//! but not by method, otherwise a typed 404.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use http::Method;
use regex::Regex;
use strand_core::{Application, BodyReceiver, FrameSender, Scope};

use crate::background::panic_message;
use crate::endpoint::Endpoint;
use crate::exception::{Error, HttpError};
use crate::request::Request;
use crate::response::Response;

/// Failure to compile a path template at registration time.
#[derive(Debug, thiserror::Error)]
#[error("invalid path template `{template}`: {reason}")]
pub struct RouteError {
    /// The offending template.
    pub template: String,
    /// What was wrong with it.
    pub reason: String,
}

impl RouteError {
    fn invalid(template: &str, reason: impl Into<String>) -> Self {
        Self {
            template: template.to_owned(),
            reason: reason.into(),
        }
    }
}

/// The outcome of testing one route against one request.
#[derive(Debug)]
pub enum RouteMatch {
    /// No structural match.
    None,
    /// The path matched but the method set excludes the request method.
    MethodMismatch,
    /// Structural and method match. Carries the updated scope (accumulated
    /// path parameters, rewritten path for mounts); the original scope is
    /// untouched so sibling routes never observe the update.
    Full(Scope),
}

/// Normalize a path to begin and end with `/`.
pub(crate) fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 2);
    if !path.starts_with('/') {
        normalized.push('/');
    }
    normalized.push_str(path);
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}

/// Compile a path template into a matcher.
///
/// `anchor_end` selects a full matcher (routes) or a prefix matcher
/// (mounts, anchored at the start only).
fn compile_template(template: &str, anchor_end: bool) -> Result<Regex, RouteError> {
    let normalized = normalize_path(template);
    let mut pattern = String::with_capacity(normalized.len() + 8);
    pattern.push('^');

    for segment in normalized.split('/') {
        if segment.is_empty() {
            continue;
        }
        pattern.push('/');
        compile_segment(segment, &mut pattern, template)?;
    }
    pattern.push('/');

    if anchor_end {
        pattern.push('$');
    }

    Regex::new(&pattern).map_err(|e| RouteError::invalid(template, e.to_string()))
}

/// Compile one segment: literal runs are escaped, `{name}` placeholders
/// become named capture groups matching anything but `/`.
fn compile_segment(segment: &str, pattern: &mut String, template: &str) -> Result<(), RouteError> {
    let mut rest = segment;
    while let Some(start) = rest.find('{') {
        pattern.push_str(&regex::escape(&rest[..start]));
        let close = rest[start..]
            .find('}')
            .map(|offset| start + offset)
            .ok_or_else(|| RouteError::invalid(template, "unclosed `{` in segment"))?;
        let name = &rest[start + 1..close];
        if !is_identifier(name) {
            return Err(RouteError::invalid(
                template,
                format!("bad placeholder name `{name}`"),
            ));
        }
        pattern.push_str(&format!("(?P<{name}>[^/]+)"));
        rest = &rest[close + 1..];
    }
    pattern.push_str(&regex::escape(rest));
    Ok(())
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Extract named capture groups as `(name, value)` pairs.
fn named_params(pattern: &Regex, captures: &regex::Captures<'_>) -> Vec<(String, String)> {
    pattern
        .capture_names()
        .flatten()
        .filter_map(|name| {
            captures
                .name(name)
                .map(|m| (name.to_owned(), m.as_str().to_owned()))
        })
        .collect()
}

type SyncHandlerFn = dyn Fn(Request) -> Result<Response, Error> + Send + Sync;
type BoxedHandlerFn =
    dyn Fn(Request) -> BoxFuture<'static, Result<Response, Error>> + Send + Sync;

/// The callable shapes a route can dispatch to, resolved at registration
/// time.
#[derive(Clone)]
pub enum Handler {
    /// A plain function. Invoked on the blocking pool so it cannot stall
    /// concurrent dispatch.
    Sync(Arc<SyncHandlerFn>),
    /// An asynchronous function, awaited inline.
    Async(Arc<BoxedHandlerFn>),
    /// A stateful endpoint object with per-method entry points.
    Endpoint(Arc<dyn Endpoint>),
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Handler::Sync"),
            Self::Async(_) => f.write_str("Handler::Async"),
            Self::Endpoint(_) => f.write_str("Handler::Endpoint"),
        }
    }
}

impl Handler {
    /// Wrap a plain (blocking) function.
    pub fn from_sync<F>(f: F) -> Self
    where
        F: Fn(Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Wrap an asynchronous function.
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Error>> + Send + 'static,
    {
        Self::Async(Arc::new(move |request| Box::pin(f(request))))
    }

    /// Wrap a stateful endpoint object.
    pub fn from_endpoint<E: Endpoint + 'static>(endpoint: E) -> Self {
        Self::Endpoint(Arc::new(endpoint))
    }

    /// Invoke the handler, containing panics as internal faults.
    pub(crate) async fn invoke(&self, request: Request) -> Result<Response, Error> {
        match self {
            Self::Sync(f) => {
                let f = Arc::clone(f);
                match tokio::task::spawn_blocking(move || f(request)).await {
                    Ok(result) => result,
                    Err(join_error) => Err(Error::Internal(anyhow::anyhow!(
                        "handler panicked: {join_error}"
                    ))),
                }
            }
            Self::Async(f) => contain_panic(f(request)).await,
            Self::Endpoint(endpoint) => contain_panic(endpoint.dispatch(request)).await,
        }
    }
}

/// Await a handler future, converting a panic into an internal fault so the
/// process keeps serving.
async fn contain_panic<F>(future: F) -> Result<Response, Error>
where
    F: Future<Output = Result<Response, Error>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(Error::Internal(anyhow::anyhow!(
            "handler panicked: {}",
            panic_message(payload.as_ref())
        ))),
    }
}

/// An immutable binding of path template, compiled matcher, allowed method
/// set, and handler. Created at application-setup time, never mutated.
#[derive(Debug)]
pub struct Route {
    template: String,
    pattern: Regex,
    methods: Vec<Method>,
    handler: Handler,
}

impl Route {
    /// A route allowing GET only.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the template does not compile.
    pub fn new(template: &str, handler: Handler) -> Result<Self, RouteError> {
        Self::with_methods(template, handler, [Method::GET])
    }

    /// A route with an explicit method set. An empty set falls back to
    /// GET-only.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the template does not compile.
    pub fn with_methods(
        template: &str,
        handler: Handler,
        methods: impl IntoIterator<Item = Method>,
    ) -> Result<Self, RouteError> {
        let pattern = compile_template(template, true)?;
        let mut methods: Vec<Method> = methods.into_iter().collect();
        if methods.is_empty() {
            methods.push(Method::GET);
        }
        Ok(Self {
            template: normalize_path(template),
            pattern,
            methods,
            handler,
        })
    }

    /// The normalized template this route was registered with.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// The allowed method set.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Test this route against a request.
    #[must_use]
    pub fn matches(&self, scope: &Scope) -> RouteMatch {
        let path = normalize_path(&scope.path);
        let Some(captures) = self.pattern.captures(&path) else {
            return RouteMatch::None;
        };

        if self.methods.contains(&scope.method) {
            let params = named_params(&self.pattern, &captures);
            RouteMatch::Full(scope.with_path_params(params))
        } else {
            RouteMatch::MethodMismatch
        }
    }

    async fn handle(
        &self,
        scope: Scope,
        receive: BodyReceiver,
        send: FrameSender,
    ) -> Result<(), Error> {
        let request = Request::new(scope, receive);
        let response = self.handler.invoke(request).await?;
        tracing::debug!(template = %self.template, status = %response.status(), "sending response");
        response.send(&send).await?;
        Ok(())
    }
}

/// What a mount delegates its subtree to.
enum MountTarget {
    /// A private sub-router built from a route list.
    Routes(Router),
    /// An opaque sub-application.
    App(Arc<dyn Application>),
}

impl std::fmt::Debug for MountTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Routes(router) => f.debug_tuple("Routes").field(router).finish(),
            Self::App(_) => f.write_str("App(..)"),
        }
    }
}

/// A route-table node delegating a path prefix to a nested router or an
/// opaque sub-application.
///
/// Matching is a prefix match anchored at the start only; on success the
/// effective path seen by the subtree is rewritten to the unmatched suffix.
/// The rewrite travels on the updated scope returned in
/// [`RouteMatch::Full`], so it is scoped to this mount's dispatch and never
/// leaks to sibling routes. No method filtering happens at the mount level.
#[derive(Debug)]
pub struct Mount {
    template: String,
    pattern: Regex,
    target: MountTarget,
}

impl Mount {
    /// Mount a route list under a prefix (owns a private sub-router).
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the prefix template does not compile.
    pub fn routes(template: &str, routes: Vec<Route>) -> Result<Self, RouteError> {
        let mut router = Router::new();
        for route in routes {
            router.add_route(route);
        }
        Ok(Self {
            template: normalize_path(template),
            pattern: compile_template(template, false)?,
            target: MountTarget::Routes(router),
        })
    }

    /// Mount an opaque sub-application under a prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the prefix template does not compile.
    pub fn app(template: &str, app: Arc<dyn Application>) -> Result<Self, RouteError> {
        Ok(Self {
            template: normalize_path(template),
            pattern: compile_template(template, false)?,
            target: MountTarget::App(app),
        })
    }

    /// The normalized prefix template.
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Test this mount's prefix against a request.
    ///
    /// Placeholders captured in the prefix contribute to the same
    /// `path_params` namespace consumed by nested routes.
    #[must_use]
    pub fn matches(&self, scope: &Scope) -> RouteMatch {
        let path = normalize_path(&scope.path);
        let Some(captures) = self.pattern.captures(&path) else {
            return RouteMatch::None;
        };

        let matched_end = captures.get(0).map_or(0, |m| m.end());
        let suffix = path[matched_end..].to_owned();
        let params = named_params(&self.pattern, &captures);
        RouteMatch::Full(scope.with_path(suffix).with_path_params(params))
    }

    async fn handle(
        &self,
        scope: Scope,
        receive: BodyReceiver,
        send: FrameSender,
    ) -> Result<(), Error> {
        match &self.target {
            MountTarget::Routes(router) => router.dispatch(scope, receive, send).await,
            MountTarget::App(app) => app
                .call(scope, receive, send)
                .await
                .map_err(Error::Internal),
        }
    }
}

#[derive(Debug)]
enum RouteEntry {
    Route(Route),
    Mount(Mount),
}

impl RouteEntry {
    fn matches(&self, scope: &Scope) -> RouteMatch {
        match self {
            Self::Route(route) => route.matches(scope),
            Self::Mount(mount) => mount.matches(scope),
        }
    }

    fn template(&self) -> &str {
        match self {
            Self::Route(route) => route.template(),
            Self::Mount(mount) => mount.template(),
        }
    }

    fn handle(
        &self,
        scope: Scope,
        receive: BodyReceiver,
        send: FrameSender,
    ) -> BoxFuture<'_, Result<(), Error>> {
        // Boxed to break the Router -> Mount -> Router recursion.
        match self {
            Self::Route(route) => route.handle(scope, receive, send).boxed(),
            Self::Mount(mount) => mount.handle(scope, receive, send).boxed(),
        }
    }
}

/// An ordered route table. Read-only after registration; dispatch walks it
/// without locking.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<RouteEntry>,
}

impl Router {
    /// Create an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a route. Registration order is dispatch order.
    pub fn add_route(&mut self, route: Route) -> &mut Self {
        self.routes.push(RouteEntry::Route(route));
        self
    }

    /// Append a mount. Registration order is dispatch order.
    pub fn add_mount(&mut self, mount: Mount) -> &mut Self {
        self.routes.push(RouteEntry::Mount(mount));
        self
    }

    /// Number of registered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Walk the route table and dispatch to the first full match.
    ///
    /// # Errors
    ///
    /// Raises [`HttpError::method_not_allowed`] if no entry fully matched
    /// but at least one matched structurally, [`HttpError::not_found`] if
    /// nothing matched, and propagates handler/response failures.
    pub async fn dispatch(
        &self,
        scope: Scope,
        receive: BodyReceiver,
        send: FrameSender,
    ) -> Result<(), Error> {
        let mut method_mismatch = false;

        for entry in &self.routes {
            match entry.matches(&scope) {
                RouteMatch::Full(updated) => {
                    tracing::debug!(
                        method = %scope.method,
                        path = %scope.path,
                        template = entry.template(),
                        "route matched"
                    );
                    return entry.handle(updated, receive, send).await;
                }
                RouteMatch::MethodMismatch => method_mismatch = true,
                RouteMatch::None => {}
            }
        }

        tracing::debug!(
            method = %scope.method,
            path = %scope.path,
            method_mismatch,
            "no route matched"
        );
        if method_mismatch {
            Err(HttpError::method_not_allowed().into())
        } else {
            Err(HttpError::not_found().into())
        }
    }
}

#[async_trait::async_trait]
impl Application for Router {
    async fn call(
        &self,
        scope: Scope,
        receive: BodyReceiver,
        send: FrameSender,
    ) -> anyhow::Result<()> {
        self.dispatch(scope, receive, send)
            .await
            .map_err(anyhow::Error::new)
    }
}
