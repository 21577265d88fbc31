//! Error types.
//!
//! Two layers. [`Error`] covers infrastructure failures: binding a port,
//! reading the configuration, a handler that vanished without replying.
//! [`Rejection`] is the client-visible taxonomy: every variant becomes an
//! error envelope with a fixed HTTP status and application error code.

use thiserror::Error;

use crate::config::ErrorMessages;
use crate::envelope::error_response;
use crate::response::Response;
use crate::status::Status;

/// Result alias for autoroute's fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure failures.
///
/// Application-level errors (404, 412, etc.) are expressed as [`Rejection`]s
/// rendered into envelopes, never as `Error`s.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The handler (or middleware) for `resource` dropped its responder
    /// without replying. The connection is closed without a response.
    #[error("handler for `{resource}` finished without responding")]
    Abandoned { resource: String },
}

/// Every way the dispatcher can refuse a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// `X-Authentication` header missing.
    AuthRequired,
    /// `X-Authentication` header present but wrong.
    AuthInvalid,
    /// Path does not start with the configured base URI.
    BaseUriMismatch,
    /// Resource not in the routing table. Carries every known resource key.
    UnknownResource { available: Vec<String> },
    /// Resource is fine but an identifier segment is empty.
    EmptyIdentifier,
    /// Resource exists but has no handler for the verb.
    VerbNotAllowed,
    /// Body is not valid UTF-8 JSON.
    MalformedBody,
    /// POST/PUT/PATCH without a body.
    EmptyBody,
    /// Verb outside GET/POST/PUT/PATCH/DELETE/OPTIONS.
    UnsupportedVerb,
    /// The request body could not be read off the connection.
    UnreadableBody { cause: String },
    /// The proxy timeout elapsed before the handler replied.
    ConnectionTimeout,
    InternalUnexpected,
}

impl Rejection {
    pub fn status(&self) -> Status {
        match self {
            Self::AuthRequired        => Status::ProxyAuthenticationRequired,
            Self::AuthInvalid         => Status::Unauthorized,
            Self::BaseUriMismatch     => Status::BadRequest,
            Self::UnknownResource { .. } => Status::NotFound,
            Self::EmptyIdentifier     => Status::PreconditionFailed,
            Self::VerbNotAllowed      => Status::MethodNotAllowed,
            Self::MalformedBody       => Status::NotAcceptable,
            Self::EmptyBody           => Status::NotAcceptable,
            Self::UnsupportedVerb     => Status::MethodNotAllowed,
            Self::UnreadableBody { .. } => Status::BadRequest,
            Self::ConnectionTimeout   => Status::GatewayTimeout,
            Self::InternalUnexpected  => Status::InternalServerError,
        }
    }

    /// Application error code, independent of the HTTP status.
    pub fn error_code(&self) -> i64 {
        match self {
            Self::UnreadableBody { .. } => 0,
            Self::MalformedBody       => 1,
            Self::EmptyBody           => 2,
            Self::UnsupportedVerb     => 6,
            Self::AuthRequired        => 10,
            Self::AuthInvalid         => 11,
            Self::BaseUriMismatch     => 19,
            Self::UnknownResource { .. } => 20,
            Self::EmptyIdentifier     => 25,
            Self::VerbNotAllowed      => 29,
            Self::ConnectionTimeout   => -2,
            Self::InternalUnexpected  => -1,
        }
    }

    /// Developer-facing message. `None` lets the error handler pick its
    /// per-status default.
    pub fn dev_message(&self) -> Option<String> {
        let msg = match self {
            Self::AuthRequired => "Proxy authentication required".to_owned(),
            Self::AuthInvalid => "Unauthorized".to_owned(),
            Self::BaseUriMismatch => {
                "Could not match the base URI, maybe you have not specified the API version"
                    .to_owned()
            }
            Self::UnknownResource { available } => {
                let mut msg =
                    String::from("Not found, check the requested resource on URI\nAvailable resources:");
                for resource in available {
                    msg.push_str(&format!(" /{resource}.json"));
                }
                msg
            }
            Self::EmptyIdentifier => {
                "Precondition failed, resource is OK, but provided ID is invalid (null)".to_owned()
            }
            Self::VerbNotAllowed => {
                "URL OK, but requested method is not allowed, \
                 try OPTIONS to see available verbs to this resource"
                    .to_owned()
            }
            Self::MalformedBody => {
                "Not acceptable, body content must be a valid JSON with UTF-8 charset".to_owned()
            }
            Self::EmptyBody => {
                "Empty body received, not acceptable for this request method, try using GET"
                    .to_owned()
            }
            Self::UnsupportedVerb => "Method not allowed (unknown method)".to_owned(),
            Self::UnreadableBody { cause } => format!("Bad request\n{cause}"),
            Self::ConnectionTimeout => "Connection timeout".to_owned(),
            Self::InternalUnexpected => return None,
        };
        Some(msg)
    }

    /// Renders the error envelope for this rejection.
    pub fn render(&self, defaults: &ErrorMessages) -> Response {
        error_response(self.status().into(), self.error_code(), self.dev_message(), None, None, defaults)
    }
}
