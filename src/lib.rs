//! # autoroute
//!
//! A convention-based JSON REST dispatcher for services behind a reverse
//! proxy.
//!
//! ## The contract
//!
//! The proxy terminates TLS, rate-limits, and authenticates end users. It
//! forwards to autoroute with a shared secret in `X-Authentication`.
//! autoroute does the rest by convention instead of configuration:
//!
//! - **Paths**: `/v1/products/123/images/7.json` addresses resource
//!   `products/images`, id `123`, subresource property `7`.
//! - **Query strings**: `limit`, `offset`, `sort=a,-b`, `fields=x,y`, and
//!   every other parameter as an exact-match filter, translated to
//!   [`QueryMeta`].
//! - **Envelopes**: every reply, redirect and error leaves as one of three
//!   JSON shapes, see [`envelope`].
//! - **Discovery**: `OPTIONS` on any resource lists its verbs and nested
//!   resources; `GET /v1/` lists every top-level resource.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use autoroute::{Call, Config, Context, Dispatcher, Method, Reply, Responder, RoutingTable, Server};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> autoroute::Result<()> {
//!     let config = Config::load("autoroute.toml")?;
//!     let routes = RoutingTable::new()
//!         .on(Method::Get, "products", list_products)
//!         .on(Method::Get, "products/images", list_images);
//!
//!     let addr = config.addr();
//!     let dispatcher = Dispatcher::new(Context::new(config, routes));
//!     Server::bind(addr).serve(dispatcher).await
//! }
//!
//! async fn list_products(call: Call, respond: Responder) {
//!     // call.meta.limit, call.meta.sort, call.meta.query …
//!     respond.respond(Reply::ok(json!([])).with_meta(json!({ "limit": call.meta.limit })));
//! }
//!
//! async fn list_images(call: Call, respond: Responder) {
//!     let product = call.id.unwrap_or_default();
//!     respond.respond(Reply::ok(json!({ "product": product, "images": [] })));
//! }
//! ```

mod config;
mod dispatcher;
mod error;
mod handler;
mod method;
mod request;
mod response;
mod routes;
mod server;
mod status;

pub mod envelope;
pub mod middleware;
pub mod path;
pub mod query;

pub use config::{Config, ErrorMessages, ProxyConfig};
pub use dispatcher::{AUTH_HEADER, Context, Dispatcher};
pub use envelope::Reply;
pub use error::{Error, Rejection, Result};
pub use handler::{Call, Handler, Responder};
pub use method::Method;
pub use query::{QueryMeta, SortField, SortOrder};
pub use request::Request;
pub use response::Response;
pub use routes::{RoutingTable, to_uri};
pub use server::Server;
pub use status::Status;
