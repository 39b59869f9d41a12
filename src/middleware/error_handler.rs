use actix_web::http::StatusCode;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpResponse, Result, dev::ServiceResponse};
use serde_json::json;

use crate::utils::error::ForumError;
use crate::utils::response::service_name;

fn error_kind(status: StatusCode) -> &'static str {
    match status {
        StatusCode::NOT_FOUND => "NOT_FOUND",
        StatusCode::UNAUTHORIZED => "UNAUTHORIZED",
        StatusCode::FORBIDDEN => "FORBIDDEN",
        StatusCode::METHOD_NOT_ALLOWED => "METHOD_NOT_ALLOWED",
        s if s.is_client_error() => "INVALID_ARGUMENT",
        _ => "INTERNAL",
    }
}

fn envelope<B>(res: ServiceResponse<B>, message: String) -> Result<ErrorHandlerResponse<B>> {
    let status = res.status();
    let body = HttpResponse::build(status).json(json!({
        "success": false,
        "message": message,
        "httpStatusCode": status.as_u16(),
        "error": error_kind(status),
        "retryable": false,
        "service": service_name(),
    }));
    let (req, _) = res.into_parts();
    let res = ServiceResponse::new(req, body.map_into_right_body());

    Ok(ErrorHandlerResponse::Response(res))
}

fn is_forum_error<B>(res: &ServiceResponse<B>) -> bool {
    res.response()
        .error()
        .and_then(|e| e.as_error::<ForumError>())
        .is_some()
}

/// Unknown routes, plus framework 404s that did not come from a handler.
pub fn not_found<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    if is_forum_error(&res) {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }
    envelope(res, "Route does not exist".to_string())
}

/// Wraps errors raised by extractors and middleware (bad JSON, missing
/// bearer token, ...) in the same envelope handlers use.
pub fn handle_error<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    if is_forum_error(&res) {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    }
    let message = res
        .response()
        .error()
        .map(|e| e.to_string())
        .unwrap_or_else(|| {
            res.status()
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });
    envelope(res, message)
}
