// SPDX-License-Identifier: MIT OR Apache-2.0
//! `run diagnose --run-id <id>` (§6.6).

use anyhow::Result;
use compliance_core::RunEvent;
use compliance_error::{ComplianceError, ErrorKind};
use std::path::Path;
use uuid::Uuid;

/// Print `run_id`'s per-stage event record, ordered by `seq` ascending.
///
/// Reads `<data-dir>/runs/<run_id>/events.jsonl` directly off disk — the
/// same file `compliance-api` writes at the end of `POST
/// /runs/{id}/execute` — rather than calling `GET /runs/{id}/events`, so
/// this command works even when no API server is running.
pub fn cmd_diagnose(data_dir: &Path, run_id: Uuid) -> Result<()> {
    let path = data_dir.join("runs").join(run_id.to_string()).join("events.jsonl");
    let content = std::fs::read_to_string(&path).map_err(|e| {
        ComplianceError::new(ErrorKind::NotFound, format!("no event log for run {run_id}")).with_source(e)
    })?;

    let mut events: Vec<RunEvent> = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let event: RunEvent = serde_json::from_str(line).map_err(|e| {
            ComplianceError::new(ErrorKind::Integrity, format!("malformed event at line {}", line_no + 1))
                .with_source(e)
        })?;
        events.push(event);
    }
    events.sort_by_key(|e| e.seq);

    if events.is_empty() {
        println!("no events recorded for run {run_id}");
        return Ok(());
    }
    for event in &events {
        println!("{:>4}  {:<14} {}", event.seq, event.stage, event.message);
    }
    Ok(())
}
