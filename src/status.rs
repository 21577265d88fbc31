//! The HTTP status codes the dispatcher itself emits, as a typed enum.
//!
//! Handlers are free to reply with any numeric status; [`Status`] is for the
//! codes the routing layer and the envelope builder reason about.
//!
//! ```rust
//! use autoroute::{Reply, Status};
//!
//! Reply::ok(serde_json::json!({ "id": 42 })).status(Status::Created);
//! Reply::redirect(Status::MovedPermanently, "/v2/users/42.json");
//! ```

/// Status codes used by the dispatcher and its envelopes.
#[allow(clippy::enum_variant_names)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    // ── 2xx Success ───────────────────────────────────────────────────────────
    Ok,                            // 200
    Created,                       // 201
    Accepted,                      // 202

    // ── 3xx Redirection ───────────────────────────────────────────────────────
    MovedPermanently,              // 301
    TemporaryRedirect,             // 307

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,                    // 400
    Unauthorized,                  // 401
    NotFound,                      // 404
    MethodNotAllowed,              // 405
    NotAcceptable,                 // 406
    ProxyAuthenticationRequired,   // 407
    PreconditionFailed,            // 412

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError,           // 500
    GatewayTimeout,                // 504
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        match s {
            Status::Ok                          => 200,
            Status::Created                     => 201,
            Status::Accepted                    => 202,
            Status::MovedPermanently            => 301,
            Status::TemporaryRedirect           => 307,
            Status::BadRequest                  => 400,
            Status::Unauthorized                => 401,
            Status::NotFound                    => 404,
            Status::MethodNotAllowed            => 405,
            Status::NotAcceptable               => 406,
            Status::ProxyAuthenticationRequired => 407,
            Status::PreconditionFailed          => 412,
            Status::InternalServerError         => 500,
            Status::GatewayTimeout              => 504,
        }
    }
}
