//! telemon core library
//!
//! Live sensor metrics ingestion: a supervised broker subscription feeds
//! decoded samples into bounded per-metric series that presentation layers
//! read without blocking ingestion.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod observability;
pub mod paths;
pub mod series;
pub mod snapshot;
pub mod supervisor;

// Re-export commonly used items
pub use config::{BackoffConfig, BrokerConfig, Config, MetricSpec, ObservabilityConfig};
pub use diagnostics::{DiagnosticEntry, DiagnosticLevel, Diagnostics};
pub use error::{IngestError, Result, TelemonError};
pub use observability::{health::HealthChecker, init as init_observability};
pub use series::{IngestionPipeline, RingBuffer, Sample, SampleOrder, StatsSnapshot};
pub use snapshot::SnapshotReader;
pub use supervisor::{
    ConnectionState, ConnectionSupervisor, MqttTransport, Transport, TransportEvent,
};
