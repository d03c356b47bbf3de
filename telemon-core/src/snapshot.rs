//! Read-only view for presentation layers.
//!
//! Every method is a lock-free load of the current series window or a
//! momentary read of the connection state; nothing here waits on ingestion.

use crate::diagnostics::DiagnosticEntry;
use crate::series::{IngestionPipeline, Sample, SampleOrder, StatsSnapshot};
use crate::supervisor::ConnectionState;
use std::sync::Arc;
use tokio::sync::watch;

/// Pull-based reader over a pipeline and a connection state.
#[derive(Clone)]
pub struct SnapshotReader {
    pipeline: Arc<IngestionPipeline>,
    state: watch::Receiver<ConnectionState>,
}

impl SnapshotReader {
    pub fn new(pipeline: Arc<IngestionPipeline>, state: watch::Receiver<ConnectionState>) -> Self {
        Self { pipeline, state }
    }

    /// Reader for a pipeline that is not attached to a supervisor; it
    /// always reports `Disconnected`.
    pub fn detached(pipeline: Arc<IngestionPipeline>) -> Self {
        let (_, state) = watch::channel(ConnectionState::Disconnected);
        Self::new(pipeline, state)
    }

    /// Most recent value recorded for a metric.
    pub fn latest_value(&self, metric: &str) -> Option<f64> {
        self.latest_sample(metric)?.value(metric)
    }

    pub fn latest_sample(&self, metric: &str) -> Option<Arc<Sample>> {
        self.pipeline.series(metric)?.latest()
    }

    /// The `n` most recent samples of a metric in the requested order.
    ///
    /// Unknown metrics yield an empty list.
    pub fn recent_samples(&self, metric: &str, n: usize, order: SampleOrder) -> Vec<Arc<Sample>> {
        self.pipeline.series(metric).map(|series| series.recent(n, order)).unwrap_or_default()
    }

    /// Whether the broker connection is currently up.
    pub fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Normalized metric names in configuration order.
    pub fn metric_names(&self) -> Vec<String> {
        self.pipeline.metric_names()
    }

    /// Samples retained per metric.
    pub fn capacity(&self) -> usize {
        self.pipeline.capacity()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.pipeline.stats()
    }

    /// The `n` most recent diagnostic entries, oldest first.
    pub fn diagnostics(&self, n: usize) -> Vec<Arc<DiagnosticEntry>> {
        self.pipeline.diagnostics().recent(n)
    }
}

impl std::fmt::Debug for SnapshotReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotReader")
            .field("pipeline", &self.pipeline)
            .field("state", &self.connection_state())
            .finish()
    }
}
