// SPDX-License-Identifier: MIT OR Apache-2.0
//! Structured `tracing` setup and span conventions for the compliance
//! pipeline.
//!
//! Every stage-crossing operation (ingest, chunk, retrieve, extract,
//! verify, persist) should be wrapped in the span returned by
//! [`run_span`] or [`datapoint_span`] so `run_id`/`datapoint_key`/`stage`
//! are attached as structured fields rather than interpolated into the
//! message text.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::sync::{Arc, Mutex};
use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber.
///
/// Reads `RUST_LOG` if set; otherwise falls back to `compliance=info`.
/// Intended to be called exactly once, at process startup (the API
/// server's and CLI's `main`).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("compliance=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Open a span for a whole run, to be entered for the duration of
/// orchestration.
pub fn run_span(run_id: uuid::Uuid) -> Span {
    tracing::info_span!("run", run_id = %run_id)
}

/// Open a span for one pipeline stage acting on one datapoint within a run.
pub fn datapoint_span(run_id: uuid::Uuid, datapoint_key: &str, stage: &str) -> Span {
    tracing::info_span!("datapoint", run_id = %run_id, datapoint_key, stage)
}

/// Per-run counters recorded by the orchestrator as it iterates the
/// compiled plan, independent of the persisted [`compliance_core::RunEvent`]
/// log — this is in-process aggregate telemetry, not a durable record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    /// Run these metrics belong to.
    pub run_id: Option<uuid::Uuid>,
    /// Total datapoints iterated.
    pub datapoints_total: u64,
    /// Datapoints whose candidate was downgraded at least one step.
    pub datapoints_downgraded: u64,
    /// Wall-clock duration of the run, in milliseconds.
    pub duration_ms: u64,
}

impl RunMetrics {
    /// Fraction of iterated datapoints that were downgraded, used against
    /// the configured diagnostic threshold θ. Returns `0.0` when no
    /// datapoints were iterated.
    pub fn failure_rate(&self) -> f64 {
        if self.datapoints_total == 0 {
            0.0
        } else {
            self.datapoints_downgraded as f64 / self.datapoints_total as f64
        }
    }
}

/// Thread-safe collector for completed runs' [`RunMetrics`], for process-
/// lifetime diagnostics (e.g. an admin `/metrics` endpoint). Never
/// persisted and never an input to any fingerprint.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Vec<RunMetrics>>>,
}

impl MetricsCollector {
    /// Create a new, empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed run's metrics.
    pub fn record(&self, metrics: RunMetrics) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.push(metrics);
    }

    /// Number of runs recorded so far.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("metrics lock poisoned").len()
    }

    /// Whether the collector has no recorded runs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_rate_of_empty_run_is_zero() {
        let m = RunMetrics::default();
        assert_eq!(m.failure_rate(), 0.0);
    }

    #[test]
    fn failure_rate_divides_downgrades_by_total() {
        let m = RunMetrics {
            run_id: None,
            datapoints_total: 4,
            datapoints_downgraded: 1,
            duration_ms: 0,
        };
        assert_eq!(m.failure_rate(), 0.25);
    }

    #[test]
    fn collector_records_in_order() {
        let collector = MetricsCollector::new();
        assert!(collector.is_empty());
        collector.record(RunMetrics {
            datapoints_total: 2,
            ..Default::default()
        });
        assert_eq!(collector.len(), 1);
    }
}
