//! HTTP mapping for domain errors.
//!
//! Client errors are returned as-is. Internal errors are logged here, with
//! their full message, and replaced by a generic payload unless their
//! message was built for clients, so file paths and database details never
//! reach the dashboard.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use tracing::{error, warn};

use crate::domain::{Error, ErrorCode};
use crate::middleware::trace::TRACE_ID_HEADER;

pub use crate::domain::ApiResult;

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Payload sent to the client for `error`.
fn public_payload(error: &Error) -> Error {
    match error.code() {
        ErrorCode::InternalError if !error.is_public() => {
            let redacted = Error::new(ErrorCode::InternalError, "");
            match error.trace_id() {
                Some(id) => redacted.with_trace_id(id),
                None => redacted,
            }
        }
        _ => error.clone(),
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self.code() {
            ErrorCode::InternalError => {
                error!(trace_id = ?self.trace_id(), error = %self, "request failed");
            }
            ErrorCode::ServiceUnavailable => {
                warn!(trace_id = ?self.trace_id(), error = %self, "dependency unavailable");
            }
            _ => {}
        }

        let mut builder = HttpResponse::build(status);
        if let Some(id) = self.trace_id() {
            builder.insert_header((TRACE_ID_HEADER, id.to_owned()));
        }
        builder.json(public_payload(self))
    }
}
