// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use anyhow::{Context, Result};
use clap::Parser;
use compliance_api::{build_app, AppState};
use compliance_store::FsDocumentStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "compliance-api", version, about = "Compliance assessment pipeline HTTP control-plane")]
struct Args {
    /// Bind address.
    #[arg(long, default_value = "127.0.0.1:8090")]
    bind: String,

    /// Root folder for the content-addressed document store.
    #[arg(long, default_value = ".compliance/documents")]
    data_dir: PathBuf,

    /// Path to an optional `compliance.toml` file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tenant ID for this single-tenant development deployment.
    #[arg(long)]
    tenant_id: Option<Uuid>,

    /// API key for this single-tenant development deployment.
    #[arg(long, default_value = "dev-key")]
    api_key: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    compliance_telemetry::init_tracing();
    let args = Args::parse();

    let config = compliance_config::load_config(args.config.as_deref())
        .with_context(|| "load pipeline config")?;

    let tenant_id = args.tenant_id.unwrap_or_else(Uuid::new_v4);
    let state = Arc::new(AppState::new_single_tenant(
        Arc::new(FsDocumentStore::new(args.data_dir.clone())),
        config,
        tenant_id,
        args.api_key.clone(),
        args.data_dir.clone(),
    ));

    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("bind {}", args.bind))?;
    info!(bind = %args.bind, %tenant_id, data_dir = %args.data_dir.display(), "compliance-api listening");

    axum::serve(listener, app).await.context("serve")
}
