// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

mod bundles;
mod registry;
mod run;

/// Exit code for an unmapped (non-`ComplianceError`) runtime error.
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "compliance", version, about = "Compliance assessment pipeline operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Root directory this deployment persists state under. Must match the
    /// `compliance-api` process's `--data-dir` to see the same companies,
    /// runs, and documents — the two front-ends share a filesystem, never a
    /// network connection.
    #[arg(long, global = true, default_value = ".compliance/documents")]
    data_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Regulatory bundle registry operations.
    Bundles {
        #[command(subcommand)]
        command: BundlesCommands,
    },
    /// Run lifecycle inspection.
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },
}

#[derive(Subcommand, Debug)]
enum BundlesCommands {
    /// Import bundle files from a directory into the local registry.
    Sync {
        /// Directory containing `*.json` bundle files.
        #[arg(long)]
        path: PathBuf,
        /// `merge` only adds/updates bundles found at `path`; `sync` also
        /// deactivates registry entries absent from `path`.
        #[arg(long, value_enum, default_value_t = SyncMode::Merge)]
        mode: SyncMode,
    },
    /// List registry entries.
    List,
    /// Compile a plan preview for one company/year without creating a run.
    CompilePreview {
        /// Company ID, as returned by `POST /companies`.
        #[arg(long)]
        company: Uuid,
        /// Reporting year to compile against, overriding the stored profile's.
        #[arg(long)]
        year: u16,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum SyncMode {
    /// Add/update bundles found at the source path; never deactivate.
    Merge,
    /// Add/update bundles found at the source path, and deactivate every
    /// registry entry absent from it.
    Sync,
}

#[derive(Subcommand, Debug)]
enum RunCommands {
    /// Print a run's per-stage event record, ordered by `seq` ascending.
    Diagnose {
        /// Run ID, as returned by `POST /runs`.
        #[arg(long = "run-id")]
        run_id: Uuid,
    },
}

fn main() {
    compliance_telemetry::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Bundles { command } => match command {
            BundlesCommands::Sync { path, mode } => bundles::cmd_sync(&cli.data_dir, &path, mode),
            BundlesCommands::List => bundles::cmd_list(&cli.data_dir),
            BundlesCommands::CompilePreview { company, year } => {
                bundles::cmd_compile_preview(&cli.data_dir, company, year)
            }
        },
        Commands::Run { command } => match command {
            RunCommands::Diagnose { run_id } => run::cmd_diagnose(&cli.data_dir, run_id),
        },
    };

    if let Err(err) = result {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code_for(&err));
    }
}

/// Map an `anyhow::Error` to a process exit code: the taxonomy's code if
/// the error chain carries a `ComplianceError`, otherwise a generic
/// runtime-error code.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<compliance_error::ComplianceError>())
        .map(|e| e.kind.exit_code())
        .unwrap_or(EXIT_RUNTIME_ERROR)
}
