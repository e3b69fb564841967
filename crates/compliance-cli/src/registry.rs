// SPDX-License-Identifier: MIT OR Apache-2.0
//! On-disk bundle registry: `<data-dir>/bundles/registry.json` plus one
//! canonicalized bundle file per `(bundle_id, version)`, so `bundles sync`
//! is idempotent across repeated invocations against the same source
//! directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One registry entry, keyed by `"{bundle_id}@{version}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Canonical checksum of the stored bundle.
    pub checksum: String,
    /// Whether a compile should consider this bundle.
    pub active: bool,
}

/// The whole registry, as persisted to `registry.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    /// Entries keyed by `"{bundle_id}@{version}"`, sorted for deterministic
    /// `bundles list` output.
    pub entries: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    fn path(data_dir: &Path) -> PathBuf {
        data_dir.join("bundles").join("registry.json")
    }

    /// Load the registry, or an empty one if it does not exist yet.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let path = Self::path(data_dir);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("parse {}", path.display()))
    }

    /// Persist the registry back to `registry.json`.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let path = Self::path(data_dir);
        std::fs::create_dir_all(path.parent().unwrap())
            .with_context(|| format!("create {}", path.parent().unwrap().display()))?;
        let content = serde_json::to_string_pretty(self).context("serialize registry")?;
        std::fs::write(&path, content).with_context(|| format!("write {}", path.display()))
    }

    /// Path a bundle's canonicalized JSON is stored at.
    pub fn bundle_path(data_dir: &Path, key: &str) -> PathBuf {
        data_dir.join("bundles").join(format!("{key}.json"))
    }
}
