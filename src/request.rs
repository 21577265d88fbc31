//! Incoming request, fully buffered and with its body parsed.

use http::{HeaderMap, HeaderName, HeaderValue, Uri};
use serde_json::Value;

use crate::error::Rejection;
use crate::method::Method;

/// An incoming HTTP request, ready for routing.
///
/// Only exists once the whole body has been received and accepted, so the
/// dispatcher never sees a partial or malformed body.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Value>,
}

impl Request {
    /// A request with no headers and no body.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self { method, uri, headers: HeaderMap::new(), body: None }
    }

    /// Adds a header. Names or values that are not valid HTTP are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) =
            (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value))
        {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Builds a request from its head and buffered body bytes, applying the
    /// per-verb body rules: GET, DELETE and OPTIONS discard the body; POST,
    /// PUT and PATCH require a non-empty UTF-8 JSON body.
    pub fn from_http(parts: http::request::Parts, body: &[u8]) -> Result<Self, Rejection> {
        let method: Method = parts.method.as_str().parse()
            .map_err(|()| Rejection::UnsupportedVerb)?;

        let body = if method.requires_body() {
            if body.is_empty() {
                return Err(Rejection::EmptyBody);
            }
            Some(serde_json::from_slice(body).map_err(|_| Rejection::MalformedBody)?)
        } else {
            None
        };

        Ok(Self { method, uri: parts.uri, headers: parts.headers, body })
    }

    pub fn method(&self) -> Method { self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> Option<&Value> { self.body.as_ref() }

    /// Case-insensitive header lookup. `None` if absent or not visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Path and query as requested.
    pub fn url(&self) -> &str {
        self.uri.path_and_query().map_or("/", |pq| pq.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(method: &str, uri: &str) -> http::request::Parts {
        http::Request::builder().method(method).uri(uri).body(()).unwrap().into_parts().0
    }

    #[test]
    fn get_discards_body() {
        let req = Request::from_http(parts("GET", "/v1/a?x=1"), b"garbage").unwrap();
        assert_eq!(req.method(), Method::Get);
        assert!(req.body().is_none());
        assert_eq!(req.url(), "/v1/a?x=1");
        assert_eq!(req.query(), Some("x=1"));
    }

    #[test]
    fn post_parses_json() {
        let req = Request::from_http(parts("POST", "/v1/a"), br#"{"name":"x"}"#).unwrap();
        assert_eq!(req.body(), Some(&serde_json::json!({ "name": "x" })));
    }

    #[test]
    fn body_rules() {
        assert_eq!(Request::from_http(parts("PUT", "/"), b"").unwrap_err(), Rejection::EmptyBody);
        assert_eq!(Request::from_http(parts("PATCH", "/"), b"{nope").unwrap_err(), Rejection::MalformedBody);
        assert_eq!(
            Request::from_http(parts("POST", "/"), b"\"\xff\"").unwrap_err(),
            Rejection::MalformedBody
        );
        assert_eq!(Request::from_http(parts("HEAD", "/"), b"").unwrap_err(), Rejection::UnsupportedVerb);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let req = Request::new(Method::Get, Uri::from_static("/")).with_header("X-Authentication", "s");
        assert_eq!(req.header("x-authentication"), Some("s"));
    }
}
