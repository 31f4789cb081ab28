//! Prometheus metrics for the index engine.

use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

/// Metrics for the index engine.
#[derive(Default)]
pub(super) struct Metrics {
    /// Number of update commands accepted
    pub updates: Counter,
    /// Number of membership-edit commands accepted
    pub internals: Counter,
    /// Number of find commands accepted
    pub finds: Counter,
    /// Number of membership edits applied on this node
    pub local_edits: Counter,
    /// Number of membership edits dispatched to remote owners
    pub remote_edits: Counter,
    /// Number of table writes skipped because the packed form was unchanged
    pub unchanged_tables: Counter,
    /// Number of reply frames forwarded from remote edits
    pub forwarded_frames: Counter,
    /// Number of commands acknowledged with a non-zero status
    pub failures: Counter,
    /// Current number of updates holding an object lock
    pub inflight_updates: Gauge,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given
    /// registry.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "updates",
            "Number of update commands accepted",
            metrics.updates.clone(),
        );
        registry.register(
            "internals",
            "Number of membership-edit commands accepted",
            metrics.internals.clone(),
        );
        registry.register(
            "finds",
            "Number of find commands accepted",
            metrics.finds.clone(),
        );
        registry.register(
            "local_edits",
            "Number of membership edits applied on this node",
            metrics.local_edits.clone(),
        );
        registry.register(
            "remote_edits",
            "Number of membership edits dispatched to remote owners",
            metrics.remote_edits.clone(),
        );
        registry.register(
            "unchanged_tables",
            "Number of table writes skipped because the packed form was unchanged",
            metrics.unchanged_tables.clone(),
        );
        registry.register(
            "forwarded_frames",
            "Number of reply frames forwarded from remote edits",
            metrics.forwarded_frames.clone(),
        );
        registry.register(
            "failures",
            "Number of commands acknowledged with a non-zero status",
            metrics.failures.clone(),
        );
        registry.register(
            "inflight_updates",
            "Current number of updates holding an object lock",
            metrics.inflight_updates.clone(),
        );
        metrics
    }
}
