//! # Prometheus Metrics
//!
//! Operational metrics for the ledger node, scraped at `/metrics` on the
//! metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] with
//! the `notary` prefix.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::core::Collector;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

/// Holds all Prometheus metric handles for the node.
///
/// The handles are cheap clones of shared cells, so request handlers and the
/// admission sweeper all update the same series.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Records appended through the API.
    pub records_appended_total: IntCounter,
    /// Number of records in the chain.
    pub chain_height: IntGauge,
    /// Challenges requested (including idempotent re-requests).
    pub admission_requests_total: IntCounter,
    /// Signatures that verified.
    pub signatures_validated_total: IntCounter,
    /// Signatures rejected, either malformed or from the wrong key.
    pub signatures_rejected_total: IntCounter,
    /// Admission entries currently held.
    pub pending_admissions: IntGauge,
    /// Appends that lost a race for their height.
    pub append_conflicts_total: IntCounter,
    /// Entries removed by the periodic sweep.
    pub admissions_expired_total: IntCounter,
    /// Time spent in `ChainEngine::append`, in seconds.
    pub append_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("notary".into()), None)?;

        let records_appended_total = register(
            &registry,
            IntCounter::new(
                "records_appended_total",
                "Total number of records appended to the chain",
            )?,
        )?;
        let chain_height = register(
            &registry,
            IntGauge::new("chain_height", "Number of records in the chain")?,
        )?;
        let admission_requests_total = register(
            &registry,
            IntCounter::new(
                "admission_requests_total",
                "Total number of validation challenges requested",
            )?,
        )?;
        let signatures_validated_total = register(
            &registry,
            IntCounter::new(
                "signatures_validated_total",
                "Total number of challenge signatures that verified",
            )?,
        )?;
        let signatures_rejected_total = register(
            &registry,
            IntCounter::new(
                "signatures_rejected_total",
                "Total number of challenge signatures that were rejected",
            )?,
        )?;
        let pending_admissions = register(
            &registry,
            IntGauge::new(
                "pending_admissions",
                "Admission entries currently held in memory",
            )?,
        )?;
        let append_conflicts_total = register(
            &registry,
            IntCounter::new(
                "append_conflicts_total",
                "Total number of appends that lost a race for their height",
            )?,
        )?;
        let admissions_expired_total = register(
            &registry,
            IntCounter::new(
                "admissions_expired_total",
                "Total number of admission entries removed by the sweeper",
            )?,
        )?;
        let append_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "append_latency_seconds",
                    "Time spent appending a record, in seconds",
                )
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            )?,
        )?;

        Ok(Self {
            registry,
            records_appended_total,
            chain_height,
            admission_requests_total,
            signatures_validated_total,
            signatures_rejected_total,
            pending_admissions,
            append_conflicts_total,
            admissions_expired_total,
            append_latency_seconds,
        })
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn register<C>(registry: &Registry, collector: C) -> Result<C, prometheus::Error>
where
    C: Collector + Clone + 'static,
{
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

/// Shared metrics state passed to axum handlers.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
