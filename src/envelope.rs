//! Response envelopes.
//!
//! Every response body has one of three shapes, chosen by status class:
//!
//! | Status | Body |
//! |---|---|
//! | `< 300` | the value, `{"meta": …, "result": …}`, or `{"result": scalar}` |
//! | `3xx` with a string value | `{"status", "requested_url", "endpoint", "message"}` + `Location` |
//! | anything else | `{"status", "error_code", "message", "user_message", "more_info"}` |
//!
//! Successful `GET` responses carry a weak `ETag`; no other verb does, so
//! shared caches never validate a mutating response.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use serde_json::{Value, json};
use sha1::{Digest, Sha1};

use crate::config::ErrorMessages;
use crate::method::Method;
use crate::response::Response;
use crate::status::Status;

// ── Reply ─────────────────────────────────────────────────────────────────────

/// What a handler sends back through its [`Responder`](crate::Responder).
///
/// ```rust
/// use autoroute::{Reply, Status};
/// use serde_json::json;
///
/// Reply::ok(json!([{ "id": 1 }])).with_meta(json!({ "count": 1 }));
/// Reply::ok("new-id").status(Status::Created);
/// Reply::redirect(Status::TemporaryRedirect, "/v1/mirror/items.json");
/// Reply::error(Status::NotFound, 404_01).dev_message("no such product");
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Reply {
    value: Option<Value>,
    meta: Option<Value>,
    status: u16,
    error_code: i64,
    dev_message: Option<String>,
    user_message: Option<Value>,
    more_info: Option<String>,
}

impl Default for Reply {
    fn default() -> Self {
        Self {
            value: None,
            meta: None,
            status: Status::Ok.into(),
            error_code: -1,
            dev_message: None,
            user_message: None,
            more_info: None,
        }
    }
}

impl Reply {
    /// `200` with `value` as the result.
    pub fn ok(value: impl Into<Value>) -> Self {
        Self { value: Some(value.into()), ..Self::default() }
    }

    /// `200` with an empty `{}` body.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Serializes `value` as the result.
    pub fn json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
        Ok(Self::ok(serde_json::to_value(value)?))
    }

    /// Redirect to `endpoint`. 301 tells the client to repoint future
    /// requests; any other 3xx is temporary.
    pub fn redirect(status: impl Into<u16>, endpoint: impl Into<String>) -> Self {
        Self {
            value: Some(Value::String(endpoint.into())),
            status: status.into(),
            ..Self::default()
        }
    }

    /// Error envelope. `error_code` is an application-specific code that lets
    /// clients tell apart errors sharing a status.
    pub fn error(status: impl Into<u16>, error_code: i64) -> Self {
        Self { status: status.into(), error_code, ..Self::default() }
    }

    /// Response metadata (counts, pagination echoes, …). Wraps the result as
    /// `{"meta", "result"}` when non-empty.
    pub fn with_meta(mut self, meta: impl Into<Value>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    pub fn status(mut self, status: impl Into<u16>) -> Self {
        self.status = status.into();
        self
    }

    pub fn dev_message(mut self, message: impl Into<String>) -> Self {
        self.dev_message = Some(message.into());
        self
    }

    /// Message for end users; any JSON value, e.g. one string per language.
    pub fn user_message(mut self, message: impl Into<Value>) -> Self {
        self.user_message = Some(message.into());
        self
    }

    /// Usually a link to documentation.
    pub fn more_info(mut self, info: impl Into<String>) -> Self {
        self.more_info = Some(info.into());
        self
    }
}

// ── Rendering ─────────────────────────────────────────────────────────────────

/// Per-request facts the envelope depends on.
#[derive(Clone, Copy, Debug)]
pub struct RenderContext<'a> {
    pub method: Method,
    /// Path and query exactly as requested, echoed by redirects.
    pub requested_url: &'a str,
    pub error_messages: &'a ErrorMessages,
}

/// Renders a reply into its envelope.
pub fn render(reply: Reply, ctx: &RenderContext<'_>) -> Response {
    let Reply { value, meta, status, error_code, dev_message, user_message, more_info } = reply;

    if status < 300 {
        return success(value, meta, status, ctx.method);
    }
    if status < 400 {
        if let Some(Value::String(endpoint)) = &value {
            return redirect(status, endpoint, ctx.requested_url);
        }
    }
    error_response(status, error_code, dev_message, user_message, more_info, ctx.error_messages)
}

fn success(value: Option<Value>, meta: Option<Value>, status: u16, method: Method) -> Response {
    let mut builder = Response::builder().status(status);
    let body = match value {
        Some(value @ (Value::Object(_) | Value::Array(_) | Value::Null)) => {
            match meta.filter(has_content) {
                Some(meta) => {
                    builder = builder.header("x-metadata", "true");
                    json!({ "meta": meta, "result": value })
                }
                None => value,
            }
        }
        // Typically an identifier returned after a creation.
        Some(value @ (Value::String(_) | Value::Number(_))) => json!({ "result": value }),
        _ => json!({}),
    };
    let bytes = body.to_string().into_bytes();

    if method == Method::Get {
        builder = builder.header("etag", &weak_etag(&bytes));
    }
    builder.json(bytes)
}

fn has_content(meta: &Value) -> bool {
    match meta {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

#[derive(Serialize)]
struct RedirectBody<'a> {
    status: u16,
    requested_url: &'a str,
    endpoint: &'a str,
    message: &'static str,
}

fn redirect(status: u16, endpoint: &str, requested_url: &str) -> Response {
    let message = if status == u16::from(Status::MovedPermanently) {
        "Moved permanently, please re-send this request to the specified endpoint"
    } else {
        "Temporary redirect, re-send this request to the specified temporary endpoint, \
         continue to use the original request endpoint for future requests"
    };
    let body = RedirectBody { status, requested_url, endpoint, message };
    Response::builder()
        .status(status)
        .header("location", endpoint)
        .json(to_bytes(&body))
}

#[derive(Serialize)]
struct ErrorBody {
    status: u16,
    error_code: i64,
    /// For developers.
    message: Option<String>,
    user_message: Option<Value>,
    more_info: Option<String>,
}

/// Error envelope. Missing messages fall back to per-status defaults, then
/// to the configured ones.
pub fn error_response(
    status: u16,
    error_code: i64,
    dev_message: Option<String>,
    user_message: Option<Value>,
    more_info: Option<String>,
    defaults: &ErrorMessages,
) -> Response {
    let message = dev_message.or_else(|| match status {
        401 => Some("Unauthorized".to_owned()),
        404 => Some("Not found".to_owned()),
        400 => Some("Bad request".to_owned()),
        500 => Some("Internal server error".to_owned()),
        _ => defaults.dev.clone(),
    });
    let user_message = user_message.or_else(|| match status {
        401 => Some(json!({
            "en_us": "No authorization for the requested resource",
            "pt_br": "Sem autorização para o recurso solicitado",
        })),
        404 => Some(json!({
            "en_us": "No results were found for the requested resource and ID",
            "pt_br": "Nenhum resultado foi encontrado para o recurso e ID solicitado",
        })),
        _ => defaults.usr.clone(),
    });

    let body = ErrorBody { status, error_code, message, user_message, more_info };
    Response::json(status, to_bytes(&body))
}

pub(crate) fn to_bytes<T: Serialize>(body: &T) -> Vec<u8> {
    // Plain structs with string keys always serialize.
    serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec())
}

/// `W/"<length in hex>-<first 27 chars of base64(sha1(body))>"`.
fn weak_etag(body: &[u8]) -> String {
    let hash = STANDARD.encode(Sha1::digest(body));
    format!("W/\"{:x}-{}\"", body.len(), &hash[..27])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(method: Method, messages: &ErrorMessages) -> RenderContext<'_> {
        RenderContext { method, requested_url: "/v1/old.json?x=1", error_messages: messages }
    }

    fn body(res: &Response) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[test]
    fn bare_object_without_meta() {
        let messages = ErrorMessages::default();
        let res = render(Reply::ok(json!({ "id": 1 })), &ctx(Method::Get, &messages));
        assert_eq!(res.status(), 200);
        assert_eq!(res.body(), br#"{"id":1}"#);
        assert_eq!(res.header("x-metadata"), None);
        assert_eq!(res.header("etag"), Some(r#"W/"8-h5EdGu1QmHe4OkjsU292jNzSLfE""#));
    }

    #[test]
    fn meta_wraps_result() {
        let messages = ErrorMessages::default();
        let reply = Reply::ok(json!([1, 2])).with_meta(json!({ "count": 2 }));
        let res = render(reply, &ctx(Method::Get, &messages));
        assert_eq!(body(&res), json!({ "meta": { "count": 2 }, "result": [1, 2] }));
        assert_eq!(res.header("x-metadata"), Some("true"));
    }

    #[test]
    fn empty_meta_is_ignored() {
        let messages = ErrorMessages::default();
        let reply = Reply::ok(json!([1])).with_meta(json!({}));
        let res = render(reply, &ctx(Method::Get, &messages));
        assert_eq!(body(&res), json!([1]));
        assert_eq!(res.header("x-metadata"), None);
    }

    #[test]
    fn scalar_is_wrapped_and_no_etag_for_post() {
        let messages = ErrorMessages::default();
        let res = render(Reply::ok("abc").status(Status::Created), &ctx(Method::Post, &messages));
        assert_eq!(res.status(), 201);
        assert_eq!(res.body(), br#"{"result":"abc"}"#);
        assert_eq!(res.header("etag"), None);
    }

    #[test]
    fn other_values_become_empty_object() {
        let messages = ErrorMessages::default();
        assert_eq!(render(Reply::ok(true), &ctx(Method::Put, &messages)).body(), b"{}");
        assert_eq!(render(Reply::empty(), &ctx(Method::Delete, &messages)).body(), b"{}");
    }

    #[test]
    fn permanent_redirect() {
        let messages = ErrorMessages::default();
        let reply = Reply::redirect(Status::MovedPermanently, "/v2/new.json");
        let res = render(reply, &ctx(Method::Get, &messages));
        assert_eq!(res.status(), 301);
        assert_eq!(res.header("location"), Some("/v2/new.json"));
        assert_eq!(res.header("etag"), None);
        let body = body(&res);
        assert_eq!(body["requested_url"], "/v1/old.json?x=1");
        assert_eq!(body["endpoint"], "/v2/new.json");
        assert!(body["message"].as_str().unwrap().starts_with("Moved permanently"));
        assert!(body.get("result").is_none());
    }

    #[test]
    fn temporary_redirect() {
        let messages = ErrorMessages::default();
        let res = render(Reply::redirect(Status::TemporaryRedirect, "/tmp"), &ctx(Method::Get, &messages));
        assert!(body(&res)["message"].as_str().unwrap().starts_with("Temporary redirect"));
    }

    #[test]
    fn redirect_without_endpoint_is_an_error() {
        let messages = ErrorMessages::default();
        let res = render(Reply::ok(json!({})).status(307u16).dev_message("bad"), &ctx(Method::Get, &messages));
        assert_eq!(res.status(), 307);
        assert_eq!(res.header("location"), None);
        let body = body(&res);
        assert_eq!(body["message"], "bad");
        assert_eq!(body["error_code"], -1);
    }

    #[test]
    fn error_defaults_per_status() {
        let messages = ErrorMessages { dev: Some("Unknown error".into()), usr: Some(json!("Oops")) };
        let res = render(Reply::error(Status::NotFound, 7), &ctx(Method::Get, &messages));
        assert_eq!(res.header("etag"), None);
        let body = body(&res);
        assert_eq!(body["status"], 404);
        assert_eq!(body["error_code"], 7);
        assert_eq!(body["message"], "Not found");
        assert!(body["user_message"]["en_us"].as_str().unwrap().starts_with("No results"));
        assert_eq!(body["more_info"], Value::Null);

        let res = render(Reply::error(418u16, 1), &ctx(Method::Get, &messages));
        let body = self::body(&res);
        assert_eq!(body["message"], "Unknown error");
        assert_eq!(body["user_message"], "Oops");
    }

    #[test]
    fn error_without_configured_defaults_is_null() {
        let messages = ErrorMessages::default();
        let res = error_response(409, 3, None, None, Some("https://docs".into()), &messages);
        assert_eq!(
            body(&res),
            json!({
                "status": 409,
                "error_code": 3,
                "message": null,
                "user_message": null,
                "more_info": "https://docs",
            })
        );
    }

    #[test]
    fn etag_format() {
        assert_eq!(weak_etag(br#"{"result":"abc"}"#), r#"W/"10-8wjzH62K8Z1/hE12qQpMAkin9cY""#);
    }
}
