// SPDX-License-Identifier: MIT OR Apache-2.0
//! Maps [`ComplianceError`] onto the HTTP edge.
//!
//! The error kind alone determines the status code (`ErrorKind::http_status`);
//! this module's only job is rendering the body consistently, so a caller
//! never has to guess whether a given endpoint's error shape differs from
//! another's.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use compliance_error::ComplianceError;
use serde_json::json;

/// Thin wrapper so [`ComplianceError`] can be used as an Axum handler
/// error type without violating the orphan rule.
pub struct ApiError(pub ComplianceError);

impl From<ComplianceError> for ApiError {
    fn from(err: ComplianceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "code": self.0.kind.as_str(),
            "message": self.0.message,
            "context": self.0.context,
        }));
        (status, body).into_response()
    }
}
