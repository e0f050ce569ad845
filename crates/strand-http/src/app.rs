//! Application wiring: router + exception layer + configuration.

use std::sync::Arc;

use http::{Method, StatusCode};
use strand_core::{Application, BodyReceiver, FrameSender, Scope, StrandConfig};

use crate::endpoint::Endpoint;
use crate::exception::{Error, ExceptionLayer, HttpError};
use crate::request::Request;
use crate::response::Response;
use crate::routing::{Handler, Mount, Route, RouteError, Router};

/// A wired application: a route table behind the exception-mapping layer.
///
/// `App` implements [`Application`], so a transport drives it directly and
/// another `App` can mount it as an opaque sub-application.
#[derive(Debug, Default)]
pub struct App {
    router: Router,
    exceptions: ExceptionLayer,
}

impl App {
    /// Create an empty application with diagnostics disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an application configured from a [`StrandConfig`].
    #[must_use]
    pub fn with_config(config: &StrandConfig) -> Self {
        Self {
            router: Router::new(),
            exceptions: ExceptionLayer::new(config.debug),
        }
    }

    /// Enable or disable diagnostic detail in untyped-failure responses.
    pub fn set_debug(&mut self, debug: bool) -> &mut Self {
        self.exceptions.set_debug(debug);
        self
    }

    /// Register a pre-built route.
    pub fn add_route(&mut self, route: Route) -> &mut Self {
        self.router.add_route(route);
        self
    }

    /// Register a handler for GET on `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the template does not compile.
    pub fn get<F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Error>> + Send + 'static,
    {
        self.route_with_methods(path, Handler::from_async(handler), [Method::GET])
    }

    /// Register a handler for POST on `path`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the template does not compile.
    pub fn post<F, Fut>(&mut self, path: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Error>> + Send + 'static,
    {
        self.route_with_methods(path, Handler::from_async(handler), [Method::POST])
    }

    /// Register a handler with an explicit method set.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the template does not compile.
    pub fn route_with_methods(
        &mut self,
        path: &str,
        handler: Handler,
        methods: impl IntoIterator<Item = Method>,
    ) -> Result<&mut Self, RouteError> {
        self.router
            .add_route(Route::with_methods(path, handler, methods)?);
        Ok(self)
    }

    /// Register a stateful endpoint object; the route's method set is taken
    /// from [`Endpoint::allowed_methods`].
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the template does not compile.
    pub fn endpoint<E: Endpoint + 'static>(
        &mut self,
        path: &str,
        endpoint: E,
    ) -> Result<&mut Self, RouteError> {
        let methods = endpoint.allowed_methods();
        self.route_with_methods(path, Handler::from_endpoint(endpoint), methods)
    }

    /// Mount an opaque sub-application under a path prefix.
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the prefix template does not compile.
    pub fn mount(
        &mut self,
        path: &str,
        app: Arc<dyn Application>,
    ) -> Result<&mut Self, RouteError> {
        self.router.add_mount(Mount::app(path, app)?);
        Ok(self)
    }

    /// Mount a route list under a path prefix (a private sub-router).
    ///
    /// # Errors
    ///
    /// Returns [`RouteError`] if the prefix template does not compile.
    pub fn mount_routes(
        &mut self,
        path: &str,
        routes: Vec<Route>,
    ) -> Result<&mut Self, RouteError> {
        self.router.add_mount(Mount::routes(path, routes)?);
        Ok(self)
    }

    /// Register a response-producing callback for one failure status code.
    pub fn exception_handler<F, Fut>(&mut self, status: StatusCode, handler: F) -> &mut Self
    where
        F: Fn(Request, HttpError) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, Error>> + Send + 'static,
    {
        self.exceptions.register(status, handler);
        self
    }

    /// The underlying route table.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }
}

#[async_trait::async_trait]
impl Application for App {
    async fn call(
        &self,
        scope: Scope,
        receive: BodyReceiver,
        send: FrameSender,
    ) -> anyhow::Result<()> {
        self.exceptions.call(&self.router, scope, receive, send).await
    }
}
