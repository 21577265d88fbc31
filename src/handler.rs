//! Handler trait, type erasure, and the one-shot responder.
//!
//! # How handlers are called
//!
//! A handler is any `async fn(Call, Responder)`. The dispatcher spawns it on
//! its own task and waits on the other end of the responder:
//!
//! ```text
//! async fn list(call: Call, respond: Responder) { … }   ← user writes this
//!        ↓ table.on(Method::Get, "products", list)
//! Arc::new(FnHandler(list))                              ← BoxedHandler
//!        ↓ at request time
//! tokio::spawn(handler.call(call, responder))            ← fire-and-forget
//!        ↓
//! respond.respond(reply)  ──oneshot──▶  dispatcher renders the envelope
//! ```
//!
//! The handler may reply immediately or after arbitrary async work. It
//! replies at most once: [`Responder::respond`] consumes the responder.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::envelope::Reply;
use crate::query::QueryMeta;

// ── Call ──────────────────────────────────────────────────────────────────────

/// Everything a handler receives about the request.
#[derive(Clone, Debug, Default)]
pub struct Call {
    /// Identifier of the addressed element, if the path names one.
    pub id: Option<String>,
    pub meta: QueryMeta,
    /// Parsed JSON body. Always `None` for GET, DELETE and OPTIONS.
    pub body: Option<Value>,
    /// Identifiers of nested elements after `id`, in path order.
    pub subresource_properties: Vec<String>,
}

// ── Responder ─────────────────────────────────────────────────────────────────

/// One-shot reply channel bound to a single request.
///
/// Dropping it without calling [`respond`](Responder::respond) is a defect:
/// the dispatcher logs it and closes the connection without a response.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Reply>,
}

impl Responder {
    pub(crate) fn channel() -> (Self, oneshot::Receiver<Reply>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Sends the reply. A no-op if the request is already gone (client
    /// disconnected, or the proxy timeout already answered it).
    pub fn respond(self, reply: Reply) {
        let _ = self.tx.send(reply);
    }

    /// Whether nobody is waiting for the reply any more.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future. `Send + 'static` so it can be
/// spawned.
pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, call: Call, respond: Responder) -> BoxFuture;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid resource handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(call: Call, respond: Responder)
/// ```
///
/// The trait is sealed (via the private `Sealed` supertrait).
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut> private::Sealed for F
where
    F: Fn(Call, Responder) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
}

impl<F, Fut> Handler for F
where
    F: Fn(Call, Responder) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

struct FnHandler<F>(F);

impl<F, Fut> ErasedHandler for FnHandler<F>
where
    F: Fn(Call, Responder) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, call: Call, respond: Responder) -> BoxFuture {
        Box::pin((self.0)(call, respond))
    }
}
