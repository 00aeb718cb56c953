use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use goldline_core::{DomainError, ErrorKind};

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Dependency => StatusCode::BAD_GATEWAY,
    }
}

/// `{"error": kind, "message", "id"}` with the status for the error's kind.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let kind = err.kind();
    if kind == ErrorKind::Dependency {
        tracing::error!(error = %err, "dependency failure");
    }
    (
        status_for(kind),
        axum::Json(json!({
            "error": kind.as_str(),
            "message": err.to_string(),
            "id": err.offending_id(),
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Parse a path/query id, answering 400 on failure.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: core::str::FromStr<Err = DomainError>,
{
    raw.parse::<T>().map_err(domain_error_to_response)
}
