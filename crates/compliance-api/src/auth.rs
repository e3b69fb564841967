// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tenant authentication middleware.
//!
//! Every request must carry `X-Tenant-ID` and `X-API-Key`; the pair must
//! match an entry in [`AppState::tenants`](crate::state::AppState::tenants)
//! exactly, or the request never reaches a handler. A mismatched key for a
//! real tenant ID is indistinguishable, at the response level, from an
//! unknown tenant ID — both are `401`, never a hint about which part was
//! wrong.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use compliance_error::{ComplianceError, ErrorKind};
use std::sync::Arc;
use uuid::Uuid;

/// The authenticated tenant for this request, inserted as a request
/// extension by [`tenant_auth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantId(pub Uuid);

fn header_str<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.headers().get(name)?.to_str().ok()
}

/// Axum middleware enforcing tenant credentials on every route it wraps.
pub async fn tenant_auth(State(state): State<Arc<AppState>>, mut req: Request, next: Next) -> Response {
    let result = (|| -> Result<TenantId, ApiError> {
        let tenant_header = header_str(&req, "x-tenant-id")
            .ok_or_else(|| ComplianceError::new(ErrorKind::Authz, "missing X-Tenant-ID header"))?;
        let tenant_id = Uuid::parse_str(tenant_header)
            .map_err(|_| ComplianceError::new(ErrorKind::Authz, "X-Tenant-ID is not a valid UUID"))?;
        let api_key = header_str(&req, "x-api-key")
            .ok_or_else(|| ComplianceError::new(ErrorKind::Authz, "missing X-API-Key header"))?;

        match state.tenants.get(api_key) {
            Some(expected) if *expected == tenant_id => Ok(TenantId(tenant_id)),
            _ => Err(ComplianceError::new(ErrorKind::Authz, "invalid tenant credentials").into()),
        }
    })();

    match result {
        Ok(tenant) => {
            req.extensions_mut().insert(tenant);
            next.run(req).await
        }
        Err(err) => axum::response::IntoResponse::into_response(err),
    }
}
