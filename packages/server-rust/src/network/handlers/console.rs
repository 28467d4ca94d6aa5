//! Catch-all console handler: every path not claimed by another route is a
//! console request.

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tracing::error;

use super::AppState;
use crate::service::{ConsoleRequest, ConsoleResponse, ResponseStatus};

/// Answers a console request. Only `GET` and `HEAD` are served.
///
/// Returns 503 once the server has started draining.
pub async fn console_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return (StatusCode::METHOD_NOT_ALLOWED, "console accepts GET only").into_response();
    }
    if !state.shutdown.accepting() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }

    let _guard = state.shutdown.in_flight_guard();
    let request = ConsoleRequest::new(uri.path(), uri.query());
    match state.console.oneshot(request).await {
        Ok(response) => into_http_response(response),
        Err(err) => {
            error!(error = %err, path = uri.path(), "console request aborted");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Maps a console response onto HTTP. Redirects use 303 See Other.
#[must_use]
pub fn into_http_response(response: ConsoleResponse) -> Response {
    let status = match response.status {
        ResponseStatus::Ok => StatusCode::OK,
        ResponseStatus::Redirect => StatusCode::SEE_OTHER,
        ResponseStatus::BadRequest => StatusCode::BAD_REQUEST,
        ResponseStatus::NotFound => StatusCode::NOT_FOUND,
        ResponseStatus::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, response.content_type);
    if let Some(location) = response.location {
        builder = builder.header(LOCATION, location);
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response())
}
