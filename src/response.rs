//! Outgoing HTTP response.
//!
//! Every response autoroute sends is JSON. Handlers never build a
//! [`Response`] themselves: they send a [`Reply`](crate::Reply) and the
//! envelope builder turns it into one.

use bytes::Bytes;
use http_body_util::Full;

pub(crate) const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";

/// A fully rendered HTTP response.
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) body: Vec<u8>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: u16,
}

impl Response {
    /// JSON response with the given status.
    pub(crate) fn json(status: u16, body: Vec<u8>) -> Self {
        Self::builder().status(status).json(body)
    }

    pub(crate) fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: 200 }
    }

    pub fn status(&self) -> u16 { self.status }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn headers(&self) -> &[(String, String)] { &self.headers }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Converts into the `http` type hyper writes to the wire.
    ///
    /// Headers that are not valid HTTP are dropped; an out-of-range status
    /// becomes 500.
    pub fn into_inner(self) -> http::Response<Full<Bytes>> {
        let status = http::StatusCode::from_u16(self.status)
            .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = status;
        let headers = res.headers_mut();
        for (name, value) in self.headers {
            if let (Ok(name), Ok(value)) = (
                http::HeaderName::from_bytes(name.as_bytes()),
                http::HeaderValue::from_str(&value),
            ) {
                headers.append(name, value);
            }
        }
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`]. Defaults to 200.
pub(crate) struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: u16,
}

impl ResponseBuilder {
    pub(crate) fn status(mut self, code: impl Into<u16>) -> Self {
        self.status = code.into();
        self
    }

    pub(crate) fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body.
    pub(crate) fn json(self, body: Vec<u8>) -> Response {
        let mut headers = vec![("content-type".to_owned(), CONTENT_TYPE_JSON.to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }
}
