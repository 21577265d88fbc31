//! Middleware hook.
//!
//! A single cross-cutting function that runs *instead of* the handler for
//! every routed request. It sees the full context (request head, resource,
//! verb, handler) and decides whether and when the handler runs: auditing,
//! authorization, per-resource caching and similar concerns live here.
//!
//! ```rust
//! use autoroute::middleware::Invocation;
//! use autoroute::{Reply, Responder, Status};
//!
//! async fn read_only(inv: Invocation, respond: Responder) {
//!     if inv.verb != autoroute::Method::Get {
//!         return respond.respond(Reply::error(Status::MethodNotAllowed, 100));
//!     }
//!     inv.proceed(respond).await
//! }
//! ```
//!
//! Pass it to [`Context::with_middleware`](crate::Context::with_middleware).

use std::future::Future;
use std::sync::Arc;

use http::{HeaderMap, Uri};
use serde_json::Value;

use crate::handler::{BoxFuture, BoxedHandler, Call, Responder};
use crate::method::Method;
use crate::query::QueryMeta;

/// A routed request about to reach its handler.
pub struct Invocation {
    pub id: Option<String>,
    pub meta: QueryMeta,
    pub body: Option<Value>,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Canonical resource key, e.g. `products/images`.
    pub resource: String,
    pub verb: Method,
    pub handler: BoxedHandler,
    pub subresource_properties: Vec<String>,
}

impl Invocation {
    /// Runs the resolved handler with this invocation's call data.
    pub fn proceed(self, respond: Responder) -> BoxFuture {
        let call = Call {
            id: self.id,
            meta: self.meta,
            body: self.body,
            subresource_properties: self.subresource_properties,
        };
        self.handler.call(call, respond)
    }
}

/// The middleware hook. Implemented for every
/// `Fn(Invocation, Responder) -> impl Future<Output = ()>`.
///
/// Like a handler, it must eventually reply through the responder, either
/// itself or by calling [`Invocation::proceed`].
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, invocation: Invocation, respond: Responder) -> BoxFuture;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Invocation, Responder) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, invocation: Invocation, respond: Responder) -> BoxFuture {
        Box::pin(self(invocation, respond))
    }
}

pub type BoxedMiddleware = Arc<dyn Middleware>;
