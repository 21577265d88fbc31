//! Request dispatch.
//!
//! Every request walks the same stages, and any stage may end it early with
//! an envelope:
//!
//! ```text
//! authenticate ─▶ resolve ─▶ authorize verb ─▶ translate query ─▶ invoke ─▶ responded
//!   407 / 401      400 / 404     412 / 405
//!                  202 index     200 OPTIONS
//! ```
//!
//! The handler runs on its own task. The dispatcher only waits for its
//! one-shot reply and renders it.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use subtle::ConstantTimeEq;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::envelope::{self, RenderContext};
use crate::error::{Error, Rejection, Result};
use crate::handler::{BoxedHandler, Call, Responder};
use crate::method::Method;
use crate::middleware::{BoxedMiddleware, Invocation, Middleware};
use crate::path::{ParsedPath, resolve};
use crate::query::{parse_query_string, translate};
use crate::request::Request;
use crate::response::Response;
use crate::routes::{RoutingTable, to_uri};
use crate::status::Status;

/// Shared secret header set by the upstream proxy.
pub const AUTH_HEADER: &str = "x-authentication";

/// Everything the dispatcher needs, built once at startup.
pub struct Context {
    config: Config,
    routes: RoutingTable,
    middleware: Option<BoxedMiddleware>,
}

impl Context {
    pub fn new(config: Config, routes: RoutingTable) -> Self {
        Self { config, routes, middleware: None }
    }

    /// Runs `middleware` in place of every handler invocation.
    pub fn with_middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware = Some(Arc::new(middleware));
        self
    }
}

/// A request that made it past routing.
struct Target {
    path: ParsedPath,
    handler: BoxedHandler,
}

/// Ways a request ends before reaching a handler.
enum Shortcut {
    Reject(Rejection),
    Index,
    Options(ParsedPath),
}

#[derive(Serialize)]
struct Index {
    resources: Vec<String>,
}

#[derive(Serialize)]
struct Introspection {
    available_verbs: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    subresources: Vec<String>,
}

/// Routes requests to handlers and renders their replies.
///
/// Cheap to clone; every clone shares one [`Context`].
#[derive(Clone)]
pub struct Dispatcher {
    ctx: Arc<Context>,
}

impl Dispatcher {
    pub fn new(ctx: Context) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    /// The configured proxy timeout.
    pub fn timeout(&self) -> Duration {
        self.ctx.config.proxy.timeout()
    }

    /// [`dispatch`](Self::dispatch) bounded by the configured proxy timeout.
    /// On expiry the request is answered with a 504 envelope; a handler that
    /// replies later is ignored.
    pub async fn handle(&self, req: Request) -> Result<Response> {
        self.handle_until(req, Instant::now() + self.timeout()).await
    }

    /// Like [`handle`](Self::handle), against a deadline that may already
    /// have been running while the request was read.
    pub(crate) async fn handle_until(&self, req: Request, deadline: Instant) -> Result<Response> {
        let url = req.url().to_owned();
        match tokio::time::timeout_at(deadline, self.dispatch(req)).await {
            Ok(result) => result,
            Err(_) => Ok(self.timed_out(&url)),
        }
    }

    /// The 504 envelope for a request that ran out of time.
    pub(crate) fn timed_out(&self, url: &str) -> Response {
        warn!("HTTP timeout at {url}");
        self.reject(&Rejection::ConnectionTimeout)
    }

    /// Routes one request and waits for its reply.
    ///
    /// Fails only when the handler drops its responder without replying, in
    /// which case no response exists and the connection should be closed.
    pub async fn dispatch(&self, req: Request) -> Result<Response> {
        let target = match self.route(&req) {
            Ok(target) => target,
            Err(Shortcut::Reject(rejection)) => {
                debug!(
                    method = %req.method, path = req.path(),
                    status = u16::from(rejection.status()), "rejected"
                );
                return Ok(self.reject(&rejection));
            }
            Err(Shortcut::Index) => return Ok(self.index()),
            Err(Shortcut::Options(path)) => return Ok(self.introspect(path)),
        };
        self.invoke(target, req).await
    }

    /// Renders a rejection through the error envelope.
    pub fn reject(&self, rejection: &Rejection) -> Response {
        rejection.render(&self.ctx.config.error_messages)
    }

    fn route(&self, req: &Request) -> std::result::Result<Target, Shortcut> {
        let Context { config, routes, .. } = &*self.ctx;

        match req.headers().get(AUTH_HEADER) {
            None => return Err(Shortcut::Reject(Rejection::AuthRequired)),
            Some(secret) if !secret_matches(secret.as_bytes(), &config.proxy.auth) => {
                return Err(Shortcut::Reject(Rejection::AuthInvalid));
            }
            Some(_) => {}
        }

        let path = resolve(req.path(), &config.base_uri)
            .map_err(|_| Shortcut::Reject(Rejection::BaseUriMismatch))?;

        if !routes.contains(&path.resource) {
            if path.resource.is_empty() {
                return Err(Shortcut::Index);
            }
            let available = routes.resources().map(str::to_owned).collect();
            return Err(Shortcut::Reject(Rejection::UnknownResource { available }));
        }

        if path.has_empty_identifier() {
            return Err(Shortcut::Reject(Rejection::EmptyIdentifier));
        }

        match routes.handler(&path.resource, req.method) {
            Some(handler) => Ok(Target { path, handler }),
            None if req.method == Method::Options => Err(Shortcut::Options(path)),
            None => Err(Shortcut::Reject(Rejection::VerbNotAllowed)),
        }
    }

    async fn invoke(&self, target: Target, req: Request) -> Result<Response> {
        let Context { config, middleware, .. } = &*self.ctx;
        let Target { path, handler } = target;

        let params = parse_query_string(req.query().unwrap_or_default());
        let meta = translate(&params, config.vary_fields);

        let requested_url = req.url().to_owned();
        let Request { method, uri, headers, body } = req;
        let resource = path.resource.clone();
        let (responder, reply) = Responder::channel();

        let task = match middleware {
            Some(middleware) => {
                let invocation = Invocation {
                    id: path.id,
                    meta,
                    body,
                    uri,
                    headers,
                    resource: path.resource,
                    verb: method,
                    handler,
                    subresource_properties: path.subresource_properties,
                };
                middleware.handle(invocation, responder)
            }
            None => {
                let call = Call {
                    id: path.id,
                    meta,
                    body,
                    subresource_properties: path.subresource_properties,
                };
                handler.call(call, responder)
            }
        };
        tokio::spawn(task);

        let Ok(reply) = reply.await else {
            error!(%method, url = %requested_url, resource = %resource, "handler dropped its responder");
            return Err(Error::Abandoned { resource });
        };

        let ctx = RenderContext {
            method,
            requested_url: &requested_url,
            error_messages: &config.error_messages,
        };
        let response = envelope::render(reply, &ctx);
        debug!(%method, url = %requested_url, resource = %resource, status = response.status(), "responded");
        Ok(response)
    }

    fn index(&self) -> Response {
        let Context { config, routes, .. } = &*self.ctx;
        let body = Index {
            resources: routes.top_level().map(|r| to_uri(&config.base_uri, r)).collect(),
        };
        Response::json(Status::Accepted.into(), envelope::to_bytes(&body))
    }

    fn introspect(&self, path: ParsedPath) -> Response {
        let Context { config, routes, .. } = &*self.ctx;

        let mut resource = path.resource;
        if let Some(id) = path.id {
            let nested = format!("{resource}/{id}");
            if routes.contains(&nested) {
                resource = nested;
            }
        }

        let body = Introspection {
            available_verbs: routes.verbs(&resource).into_iter().map(Method::as_str).collect(),
            subresources: routes
                .subresources_of(&resource)
                .map(|r| to_uri(&config.base_uri, r))
                .collect(),
        };
        Response::json(Status::Ok.into(), envelope::to_bytes(&body))
    }
}

/// Constant-time comparison of the proxy secret.
fn secret_matches(given: &[u8], expected: &str) -> bool {
    given.ct_eq(expected.as_bytes()).into()
}
