//! The routing table.
//!
//! Resources are registered once at startup and the table is read-only
//! afterwards. Keys are lowercase, `/`-joined collection names without the
//! identifiers between them: the handler for `/v1/products/{id}/images` is
//! registered under `products/images`.

use std::collections::BTreeMap;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

/// Resource → verb → handler.
///
/// Build it once at startup and hand it to [`Context`](crate::Context).
/// Each [`RoutingTable::on`] call returns `self` so registrations chain
/// naturally.
#[derive(Clone, Default)]
pub struct RoutingTable {
    routes: BTreeMap<String, BTreeMap<Method, BoxedHandler>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a verb on a resource. Returns `self` for chaining.
    ///
    /// ```rust
    /// # use autoroute::{Call, Method, Reply, Responder, RoutingTable};
    /// # async fn list(_: Call, r: Responder) { r.respond(Reply::empty()) }
    /// # async fn create(_: Call, r: Responder) { r.respond(Reply::empty()) }
    /// # async fn images(_: Call, r: Responder) { r.respond(Reply::empty()) }
    /// RoutingTable::new()
    ///     .on(Method::Get,  "products",        list)
    ///     .on(Method::Post, "products",        create)
    ///     .on(Method::Get,  "products/images", images);
    /// ```
    ///
    /// The resource name is canonicalized: lowercased, with surrounding `/`
    /// and a trailing `.json` removed.
    ///
    /// # Panics
    ///
    /// Panics if the canonical name is empty; the empty resource is the index.
    pub fn on(mut self, method: Method, resource: &str, handler: impl Handler) -> Self {
        let key = canonical(resource);
        assert!(!key.is_empty(), "invalid resource `{resource}`: empty name");
        self.routes
            .entry(key)
            .or_default()
            .insert(method, handler.into_boxed_handler());
        self
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.routes.contains_key(resource)
    }

    pub(crate) fn handler(&self, resource: &str, method: Method) -> Option<BoxedHandler> {
        self.routes.get(resource)?.get(&method).cloned()
    }

    /// Registered verbs for `resource`, in declaration order of [`Method`].
    pub fn verbs(&self, resource: &str) -> Vec<Method> {
        self.routes
            .get(resource)
            .map(|verbs| verbs.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Every registered resource key, sorted.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Resources with no parent.
    pub fn top_level(&self) -> impl Iterator<Item = &str> {
        self.resources().filter(|r| !r.contains('/'))
    }

    /// Every resource nested anywhere below `resource`.
    pub fn subresources_of<'a>(&'a self, resource: &str) -> impl Iterator<Item = &'a str> {
        let prefix = format!("{resource}/");
        self.resources().filter(move |r| r.starts_with(&prefix))
    }
}

fn canonical(resource: &str) -> String {
    let trimmed = resource.trim_matches('/');
    trimmed.strip_suffix(".json").unwrap_or(trimmed).to_lowercase()
}

/// The canonical URL of a resource, with `_id` standing in for identifiers.
///
/// ```rust
/// assert_eq!(autoroute::to_uri("/v1/", "products"), "/v1/products.json");
/// assert_eq!(autoroute::to_uri("/v1/", "products/images"), "/v1/products/_id/images.json");
/// ```
pub fn to_uri(base_uri: &str, resource: &str) -> String {
    format!("{base_uri}{}.json", resource.split('/').collect::<Vec<_>>().join("/_id/"))
}
