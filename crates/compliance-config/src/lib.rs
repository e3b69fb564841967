// SPDX-License-Identifier: MIT OR Apache-2.0
//! Configuration loading, validation, and merging for the compliance
//! pipeline's tunable parameters.
//!
//! Everything here is *only* read at the edge — the orchestrator loads a
//! [`PipelineConfig`] once per run invocation and then passes its fields
//! explicitly into `compliance-chunk`/`compliance-retrieve`/etc. No crate
//! downstream of the edge reads this config or any other ambient global at
//! compute time, since every value that influences `run_hash` must be an
//! explicit function input (see the design notes on global state).

#![deny(unsafe_code)]
#![warn(missing_docs)]

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Errors that can occur loading or validating a [`PipelineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The requested configuration file was not found.
    #[error("config file not found: {path}")]
    FileNotFound {
        /// Path that was requested.
        path: String,
    },
    /// The file could not be parsed as valid TOML.
    #[error("failed to parse config: {reason}")]
    ParseError {
        /// Human-readable parse error detail.
        reason: String,
    },
    /// Semantic validation failed (one or more problems).
    #[error("config validation failed: {reasons:?}")]
    ValidationError {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// Advisory-level issues that do not prevent operation but deserve attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A recommended optional field is missing.
    MissingOptionalField {
        /// Name of the missing field.
        field: String,
        /// Why it matters.
        hint: String,
    },
    /// A retrieval weight configuration is unusual but not invalid.
    UnbalancedRetrievalWeights {
        /// Configured lexical weight.
        lexical_weight: f64,
        /// Configured vector weight.
        vector_weight: f64,
    },
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOptionalField { field, hint } => {
                write!(f, "missing optional field '{field}': {hint}")
            }
            Self::UnbalancedRetrievalWeights { lexical_weight, vector_weight } => {
                write!(f, "retrieval weights ({lexical_weight}, {vector_weight}) are heavily skewed")
            }
        }
    }
}

/// Deterministic chunker parameters (§4.3). Both values participate in the
/// run fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct ChunkerSettings {
    /// Target chunk length, in characters.
    #[serde(default = "default_target_len")]
    pub target_len: usize,
    /// Overlap between consecutive chunks, in characters.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

fn default_target_len() -> usize {
    800
}
fn default_overlap() -> usize {
    80
}

impl Default for ChunkerSettings {
    fn default() -> Self {
        Self {
            target_len: default_target_len(),
            overlap: default_overlap(),
        }
    }
}

/// Hybrid retrieval parameters (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct RetrievalSettings {
    /// Number of chunks to return per query.
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    /// Weight applied to the lexical score.
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f64,
    /// Weight applied to the vector score.
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f64,
}

fn default_top_k() -> u32 {
    8
}
fn default_lexical_weight() -> f64 {
    0.5
}
fn default_vector_weight() -> f64 {
    0.5
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            lexical_weight: default_lexical_weight(),
            vector_weight: default_vector_weight(),
        }
    }
}

/// Per-run diagnostic threshold (§4.10): the orchestrator transitions a
/// completed run to `integrity_warning` when the fraction of downgraded
/// datapoints exceeds this value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct DiagnosticsSettings {
    /// Failure-rate threshold θ, in `[0.0, 1.0]`.
    #[serde(default = "default_failure_rate_threshold")]
    pub failure_rate_threshold: f64,
}

fn default_failure_rate_threshold() -> f64 {
    0.5
}

impl Default for DiagnosticsSettings {
    fn default() -> Self {
        Self {
            failure_rate_threshold: default_failure_rate_threshold(),
        }
    }
}

/// Extraction provider selection (§6.5).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProviderSettings {
    /// The deterministic, zero-external-call fallback provider.
    Fallback,
    /// The schema-constrained HTTP provider.
    HttpSchema {
        /// Endpoint URL to POST extraction requests to.
        endpoint: String,
        /// Model identifier sent with each request.
        model: String,
    },
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self::Fallback
    }
}

/// Top-level pipeline configuration, loaded once per process/run from an
/// optional `compliance.toml`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
pub struct PipelineConfig {
    /// Chunker parameters.
    #[serde(default)]
    pub chunker: ChunkerSettings,
    /// Retrieval parameters.
    #[serde(default)]
    pub retrieval: RetrievalSettings,
    /// Diagnostic threshold.
    #[serde(default)]
    pub diagnostics: DiagnosticsSettings,
    /// Extraction provider selection.
    #[serde(default)]
    pub provider: ProviderSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerSettings::default(),
            retrieval: RetrievalSettings::default(),
            diagnostics: DiagnosticsSettings::default(),
            provider: ProviderSettings::default(),
        }
    }
}

/// Load a [`PipelineConfig`] from an optional TOML file path, falling back
/// to defaults when `path` is `None`. Environment overrides are applied on
/// top in both cases.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    let mut config = match path {
        Some(p) => {
            let content = std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                path: p.display().to_string(),
            })?;
            parse_toml(&content)?
        }
        None => PipelineConfig::default(),
    };
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Parse a TOML string into a [`PipelineConfig`].
pub fn parse_toml(content: &str) -> Result<PipelineConfig, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::ParseError { reason: e.to_string() })
}

/// Apply environment variable overrides.
///
/// Recognised variables: `COMPLIANCE_PROVIDER_ENDPOINT`,
/// `COMPLIANCE_PROVIDER_MODEL`, `COMPLIANCE_DIAGNOSTICS_THRESHOLD`.
pub fn apply_env_overrides(config: &mut PipelineConfig) {
    if let (Ok(endpoint), Ok(model)) = (
        std::env::var("COMPLIANCE_PROVIDER_ENDPOINT"),
        std::env::var("COMPLIANCE_PROVIDER_MODEL"),
    ) {
        config.provider = ProviderSettings::HttpSchema { endpoint, model };
    }
    if let Ok(val) = std::env::var("COMPLIANCE_DIAGNOSTICS_THRESHOLD") {
        if let Ok(parsed) = val.parse::<f64>() {
            config.diagnostics.failure_rate_threshold = parsed;
        }
    }
}

/// Validate a parsed configuration, returning advisory warnings.
///
/// Hard errors (zero/negative chunker parameters, out-of-range weights or
/// thresholds) are returned as [`ConfigError::ValidationError`]; soft
/// issues come back as warnings.
pub fn validate_config(config: &PipelineConfig) -> Result<Vec<ConfigWarning>, ConfigError> {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if config.chunker.target_len == 0 {
        errors.push("chunker.target_len must be > 0".to_string());
    }
    if config.chunker.overlap >= config.chunker.target_len {
        errors.push("chunker.overlap must be smaller than chunker.target_len".to_string());
    }

    if config.retrieval.top_k == 0 {
        errors.push("retrieval.top_k must be > 0".to_string());
    }
    if config.retrieval.lexical_weight < 0.0 || config.retrieval.vector_weight < 0.0 {
        errors.push("retrieval weights must be non-negative".to_string());
    }
    if (config.retrieval.lexical_weight + config.retrieval.vector_weight) <= 0.0 {
        errors.push("retrieval weights must not both be zero".to_string());
    } else {
        let total = config.retrieval.lexical_weight + config.retrieval.vector_weight;
        let lexical_share = config.retrieval.lexical_weight / total;
        if !(0.05..=0.95).contains(&lexical_share) {
            warnings.push(ConfigWarning::UnbalancedRetrievalWeights {
                lexical_weight: config.retrieval.lexical_weight,
                vector_weight: config.retrieval.vector_weight,
            });
        }
    }

    if !(0.0..=1.0).contains(&config.diagnostics.failure_rate_threshold) {
        errors.push("diagnostics.failure_rate_threshold must be in [0.0, 1.0]".to_string());
    }

    if let ProviderSettings::HttpSchema { endpoint, model } = &config.provider {
        if endpoint.trim().is_empty() {
            errors.push("provider.endpoint must not be empty".to_string());
        }
        if model.trim().is_empty() {
            errors.push("provider.model must not be empty".to_string());
        }
    } else {
        warnings.push(ConfigWarning::MissingOptionalField {
            field: "provider".to_string(),
            hint: "no external provider configured; using the deterministic fallback".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(warnings)
    } else {
        Err(ConfigError::ValidationError { reasons: errors })
    }
}

/// Merge two configurations. Values in `overlay` take precedence over `base`.
pub fn merge_configs(base: PipelineConfig, overlay: PipelineConfig) -> PipelineConfig {
    PipelineConfig {
        chunker: overlay.chunker,
        retrieval: overlay.retrieval,
        diagnostics: overlay.diagnostics,
        provider: overlay.provider,
    }
}
