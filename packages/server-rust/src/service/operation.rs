//! Console request, response and error types shared by classification and
//! routing.

use objscope_core::{CoerceError, RegistryError, RequestFormatError, TokenError};

use super::delegate::DelegateError;

// ---------------------------------------------------------------------------
// ConsoleOperation
// ---------------------------------------------------------------------------

/// A classified console request. Paths and names are already percent-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleOperation {
    /// `/`
    RootRedirect,
    /// `/<Type>[?<receiver-token>]`
    Members {
        type_name: String,
        receiver: Option<String>,
    },
    /// `/<Type>/<op>?call&...`. `query` is the raw remainder after `call`.
    Call { path: String, query: String },
    /// `/<Type>/<field>?get<receiver-token>`
    GetField {
        path: String,
        receiver: Option<String>,
    },
    /// `/[<uuid>]?persist[=<name>]`
    Persist { token: String, name: Option<String> },
    /// `/[<uuid>]` or `/$<name>`
    Resolve { token: String },
    /// Anything else.
    Unrouted { path: String },
}

// ---------------------------------------------------------------------------
// ConsoleResponse
// ---------------------------------------------------------------------------

/// Transport-neutral status of a console response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Ok,
    Redirect,
    BadRequest,
    NotFound,
    InternalError,
}

/// What the console answers. The network layer maps it onto HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleResponse {
    pub status: ResponseStatus,
    pub content_type: &'static str,
    pub body: String,
    /// Target of a redirect.
    pub location: Option<String>,
}

pub const HTML: &str = "text/html; charset=utf-8";
pub const PLAIN: &str = "text/plain; charset=utf-8";

impl ConsoleResponse {
    #[must_use]
    pub fn html(body: String) -> Self {
        Self {
            status: ResponseStatus::Ok,
            content_type: HTML,
            body,
            location: None,
        }
    }

    #[must_use]
    pub fn redirect(location: String) -> Self {
        Self {
            status: ResponseStatus::Redirect,
            content_type: PLAIN,
            body: String::new(),
            location: Some(location),
        }
    }

    #[must_use]
    pub fn plain(status: ResponseStatus, body: String) -> Self {
        Self {
            status,
            content_type: PLAIN,
            body,
            location: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RouteError
// ---------------------------------------------------------------------------

/// Failures that stop a request before or outside the invoked operation.
///
/// The operation's own failure is not here: it is reported inside a normal
/// result page.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    Malformed(#[from] RequestFormatError),
    #[error(transparent)]
    BadToken(#[from] TokenError),
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("no operation {name} matching parameter types ({parameter_types})")]
    UnknownOperation {
        name: String,
        parameter_types: String,
    },
    #[error("no field {0}")]
    UnknownField(String),
    #[error("persistent name must not be empty")]
    EmptyName,
    #[error(transparent)]
    Coerce(#[from] CoerceError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Delegate(DelegateError),
    #[error("not found: {0}")]
    Unrouted(String),
}

impl RouteError {
    #[must_use]
    pub fn status(&self) -> ResponseStatus {
        match self {
            Self::Malformed(_)
            | Self::BadToken(_)
            | Self::EmptyName
            | Self::Coerce(CoerceError::ValueFormat { .. }) => ResponseStatus::BadRequest,
            Self::UnknownType(_)
            | Self::UnknownOperation { .. }
            | Self::UnknownField(_)
            | Self::Coerce(CoerceError::NoSuchObject(_))
            | Self::Registry(_)
            | Self::Unrouted(_) => ResponseStatus::NotFound,
            Self::Delegate(_) => ResponseStatus::InternalError,
        }
    }
}

impl From<RouteError> for ConsoleResponse {
    fn from(err: RouteError) -> Self {
        ConsoleResponse::plain(err.status(), err.to_string())
    }
}
