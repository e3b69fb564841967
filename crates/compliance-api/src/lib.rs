// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP control-plane for the compliance assessment pipeline (§6.1).
//!
//! [`build_app`] wires the core surface — company/document/run endpoints —
//! behind a tenant-auth layer. State is in-memory (see [`state::AppState`]);
//! a production deployment would back the same handlers with the
//! relational store described in §1 without touching this module.

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Tenant credential middleware.
pub mod auth;
/// [`error::ApiError`], the HTTP rendering of [`compliance_error::ComplianceError`].
pub mod error;
/// Route handlers for every endpoint in §6.1.
pub mod handlers;
/// Shared [`state::AppState`] and its registries.
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use state::AppState;

/// Build the Axum router for the full core HTTP surface.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/companies", post(handlers::create_company))
        .route("/documents/upload", post(handlers::upload_document))
        .route("/documents/auto-discover", post(handlers::auto_discover))
        .route("/runs", post(handlers::create_run))
        .route("/runs/{id}/execute", post(handlers::execute_run))
        .route("/runs/{id}/status", get(handlers::run_status))
        .route("/runs/{id}/diagnostics", get(handlers::run_diagnostics))
        .route("/runs/{id}/events", get(handlers::run_events))
        .route("/runs/{id}/report", get(handlers::run_report))
        .route("/runs/{id}/evidence-pack", get(handlers::evidence_pack))
        .route("/runs/{id}/evidence-pack-preview", get(handlers::evidence_pack_preview))
        .route("/runs/{id}/regulatory-plan", get(handlers::regulatory_plan))
        .layer(axum::middleware::from_fn_with_state(state.clone(), auth::tenant_auth))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
