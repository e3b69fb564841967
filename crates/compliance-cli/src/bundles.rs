// SPDX-License-Identifier: MIT OR Apache-2.0
//! `bundles sync|list|compile-preview` (§6.6).

use crate::registry::{Registry, RegistryEntry};
use crate::SyncMode;
use anyhow::{Context, Result};
use compliance_bundle::Bundle;
use compliance_core::CompanyProfile;
use compliance_error::{ComplianceError, ErrorKind};
use std::path::Path;
use uuid::Uuid;

fn bundle_key(bundle: &Bundle) -> String {
    format!("{}@{}", bundle.bundle_id, bundle.version)
}

/// Load and structurally validate every `*.json` file directly under
/// `path`, in lexicographic filename order (so registry writes are
/// deterministic run over run).
fn load_source_bundles(path: &Path) -> Result<Vec<Bundle>> {
    let mut file_names: Vec<_> = std::fs::read_dir(path)
        .with_context(|| format!("read directory {}", path.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    file_names.sort();

    let mut bundles = Vec::with_capacity(file_names.len());
    for file in file_names {
        let content = std::fs::read_to_string(&file).with_context(|| format!("read {}", file.display()))?;
        let bundle: Bundle = serde_json::from_str(&content)
            .map_err(|e| ComplianceError::new(ErrorKind::Validation, format!("malformed bundle file {}", file.display())).with_source(e))?;
        bundle.validate()?;
        bundles.push(bundle);
    }
    Ok(bundles)
}

/// `bundles sync --path <dir> --mode {merge|sync}`.
pub fn cmd_sync(data_dir: &Path, path: &Path, mode: SyncMode) -> Result<()> {
    let bundles = load_source_bundles(path)?;
    let mut registry = Registry::load(data_dir)?;

    let mut seen = std::collections::BTreeSet::new();
    for bundle in &bundles {
        let key = bundle_key(bundle);
        let checksum = bundle.checksum()?;
        let canonical = compliance_canon::canonicalize(bundle).context("canonicalize bundle")?;
        std::fs::write(Registry::bundle_path(data_dir, &key), canonical)
            .with_context(|| format!("write bundle {key}"))?;
        registry.entries.insert(key.clone(), RegistryEntry { checksum, active: true });
        seen.insert(key);
    }

    if mode == SyncMode::Sync {
        for (key, entry) in registry.entries.iter_mut() {
            if !seen.contains(key) {
                entry.active = false;
            }
        }
    }

    registry.save(data_dir)?;
    println!("synced {} bundle(s) from {}", bundles.len(), path.display());
    Ok(())
}

/// `bundles list`.
pub fn cmd_list(data_dir: &Path) -> Result<()> {
    let registry = Registry::load(data_dir)?;
    for (key, entry) in &registry.entries {
        println!("{key}  {}  active={}", entry.checksum, entry.active);
    }
    Ok(())
}

/// `bundles compile-preview --company <id> --year <y>`.
pub fn cmd_compile_preview(data_dir: &Path, company: Uuid, year: u16) -> Result<()> {
    let profile_path = data_dir.join("companies").join(format!("{company}.json"));
    let content = std::fs::read_to_string(&profile_path).map_err(|e| {
        ComplianceError::new(ErrorKind::NotFound, format!("no company profile for {company}")).with_source(e)
    })?;
    let mut profile: CompanyProfile = serde_json::from_str(&content)
        .map_err(|e| ComplianceError::new(ErrorKind::Validation, "malformed company profile").with_source(e))?;
    profile.reporting_year = year;

    let registry = Registry::load(data_dir)?;
    let mut bundles = Vec::new();
    for (key, entry) in &registry.entries {
        if !entry.active {
            continue;
        }
        let bundle_path = Registry::bundle_path(data_dir, key);
        let content = std::fs::read_to_string(&bundle_path).with_context(|| format!("read bundle {key}"))?;
        let bundle: Bundle = serde_json::from_str(&content)
            .map_err(|e| ComplianceError::new(ErrorKind::Integrity, format!("corrupt registry bundle {key}")).with_source(e))?;
        bundles.push(bundle);
    }

    let plan = compliance_compiler::compile(&bundles, &profile)?;
    let json = serde_json::to_string_pretty(&plan).context("serialize compiled plan")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use compliance_bundle::{DatapointType, Obligation, Regime};

    fn sample_bundle() -> Bundle {
        Bundle {
            bundle_id: "esrs_mini".to_string(),
            version: "2026.01".to_string(),
            regime: Regime { code: "ESRS".to_string(), name: "ESRS".to_string() },
            jurisdiction: "DE".to_string(),
            obligations: vec![Obligation {
                code: "E1-1".to_string(),
                section: "Climate".to_string(),
                datapoint_keys: vec!["e1_1".to_string()],
                mandatory: true,
                applicability: "true".to_string(),
                phase_in: None,
            }],
            datapoints: vec![compliance_bundle::Datapoint {
                key: "e1_1".to_string(),
                label: "Transition plan".to_string(),
                datapoint_type: DatapointType::Text,
                requires_baseline: false,
                unit_vocabulary: vec![],
            }],
            overlays: vec![],
            source_record_ids: vec![],
        }
    }

    #[test]
    fn sync_then_list_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("data");
        let source_dir = tmp.path().join("source");
        std::fs::create_dir_all(&source_dir).unwrap();
        std::fs::write(
            source_dir.join("esrs_mini.json"),
            serde_json::to_string(&sample_bundle()).unwrap(),
        )
        .unwrap();

        cmd_sync(&data_dir, &source_dir, SyncMode::Merge).unwrap();
        let registry = Registry::load(&data_dir).unwrap();
        assert_eq!(registry.entries.len(), 1);
        assert!(registry.entries["esrs_mini@2026.01"].active);
    }

    #[test]
    fn sync_mode_deactivates_removed_bundles() {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = tmp.path().join("data");
        let source_dir = tmp.path().join("source");
        std::fs::create_dir_all(&source_dir).unwrap();
        std::fs::write(
            source_dir.join("esrs_mini.json"),
            serde_json::to_string(&sample_bundle()).unwrap(),
        )
        .unwrap();
        cmd_sync(&data_dir, &source_dir, SyncMode::Merge).unwrap();

        std::fs::remove_file(source_dir.join("esrs_mini.json")).unwrap();
        cmd_sync(&data_dir, &source_dir, SyncMode::Sync).unwrap();

        let registry = Registry::load(&data_dir).unwrap();
        assert!(!registry.entries["esrs_mini@2026.01"].active);
    }
}
