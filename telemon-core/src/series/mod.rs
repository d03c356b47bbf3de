//! In-memory metric series.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   raw bytes   ┌───────────────────┐
//! │  Supervisor  │ ─────────────►│ IngestionPipeline │
//! └──────────────┘               │  ├─ decode()      │
//!                                │  ├─ extract()     │
//!                                │  └─ push()        │
//!                                │                   │
//!                                │  PipelineState    │
//!                                │  └─ RingBuffer    │
//!                                │     per metric    │
//!                                └─────────┬─────────┘
//!                                          │ lock-free loads
//!                                ┌─────────▼─────────┐
//!                                │  SnapshotReader   │
//!                                └───────────────────┘
//! ```

mod pipeline;
mod ring;
mod sample;

pub use pipeline::{IngestionPipeline, MetricSeries, PipelineState, StatsSnapshot};
pub use ring::{RingBuffer, SampleOrder};
pub use sample::Sample;
