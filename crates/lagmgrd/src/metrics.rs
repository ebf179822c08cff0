//! Prometheus metrics for lagmgrd.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

use crate::rpc::LagStatus;

/// Operation names used as metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateLag,
    DeleteLag,
    AddLagMember,
    RemoveLagMember,
    GetLag,
    ListLags,
    GetPortLag,
}

impl Operation {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::CreateLag => "create_lag",
            Operation::DeleteLag => "delete_lag",
            Operation::AddLagMember => "add_lag_member",
            Operation::RemoveLagMember => "remove_lag_member",
            Operation::GetLag => "get_lag",
            Operation::ListLags => "list_lags",
            Operation::GetPortLag => "get_port_lag",
        }
    }
}

/// Metrics collector for the LAG service.
#[derive(Clone)]
pub struct LagMetrics {
    pub operations_total: IntCounterVec,
    pub lags: IntGauge,
    pub lag_members: IntGauge,
    pub operation_duration_seconds: HistogramVec,

    // Registry for export
    pub registry: Arc<Registry>,
}

impl LagMetrics {
    /// Create and register all metrics in a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let operations_total = IntCounterVec::new(
            Opts::new(
                "lagmgrd_operations_total",
                "Total number of LAG operations by result status",
            ),
            &["operation", "status"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let lags = IntGauge::with_opts(Opts::new(
            "lagmgrd_lags",
            "Current number of LAG groups",
        ))?;
        registry.register(Box::new(lags.clone()))?;

        let lag_members = IntGauge::with_opts(Opts::new(
            "lagmgrd_lag_members",
            "Current number of ports aggregated into LAGs",
        ))?;
        registry.register(Box::new(lag_members.clone()))?;

        let operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "lagmgrd_operation_duration_seconds",
                "LAG operation latency in seconds, including lock wait",
            )
            .buckets(vec![
                0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
            ]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration_seconds.clone()))?;

        Ok(Self {
            operations_total,
            lags,
            lag_members,
            operation_duration_seconds,
            registry: Arc::new(registry),
        })
    }

    /// Record a finished operation.
    pub fn record_operation(&self, operation: Operation, status: LagStatus, elapsed: Duration) {
        self.operations_total
            .with_label_values(&[operation.as_str(), status.as_str()])
            .inc();
        self.operation_duration_seconds
            .with_label_values(&[operation.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    /// Update the registry size gauges.
    pub fn set_registry_size(&self, lags: usize, members: usize) {
        self.lags.set(i64::try_from(lags).unwrap_or(i64::MAX));
        self.lag_members
            .set(i64::try_from(members).unwrap_or(i64::MAX));
    }

    /// Returns the count recorded for an operation and status.
    pub fn operation_count(&self, operation: Operation, status: LagStatus) -> u64 {
        self.operations_total
            .with_label_values(&[operation.as_str(), status.as_str()])
            .get()
    }

    /// Render all metrics in Prometheus text format.
    pub fn gather_text(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
