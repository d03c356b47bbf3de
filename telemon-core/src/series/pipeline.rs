//! Payload decoding and sample fan-out.
//!
//! The pipeline is the only writer of metric series. Each accepted payload
//! becomes one [`Sample`] pushed to every configured series; a rejected
//! payload touches no series at all.

use crate::config::{Config, MetricSpec};
use crate::diagnostics::Diagnostics;
use crate::error::IngestError;
use crate::observability::metrics as telemetry;
use crate::series::{RingBuffer, Sample};
use arc_swap::ArcSwapOption;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace, warn};

/// Bounded history of samples for one metric.
pub type MetricSeries = RingBuffer<Sample>;

/// The set of series owned by a pipeline, keyed by normalized metric name.
pub struct PipelineState {
    series: HashMap<String, MetricSeries>,
}

impl PipelineState {
    fn new<'a>(names: impl Iterator<Item = &'a str>, capacity: usize) -> Self {
        let series = names.map(|name| (name.to_string(), RingBuffer::new(capacity))).collect();
        Self { series }
    }

    /// Look up a series by metric name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&MetricSeries> {
        self.series.get(name).or_else(|| self.series.get(&name.to_lowercase()))
    }
}

/// How one configured metric is pulled out of a payload.
#[derive(Debug, Clone)]
struct MetricBinding {
    name: String,
    /// Lowercase keys tried in order: the name, then aliases.
    keys: Vec<String>,
    default: f64,
}

impl MetricBinding {
    fn from_spec(spec: &MetricSpec) -> Self {
        let name = spec.key();
        let mut keys = vec![name.clone()];
        keys.extend(spec.aliases.iter().map(|a| a.trim().to_lowercase()));
        Self { name, keys, default: spec.default }
    }

    fn extract(&self, record: &Map<String, Value>) -> Option<f64> {
        self.keys.iter().find_map(|key| lookup(record, key).and_then(numeric))
    }
}

/// Find `key` in the record, preferring an exact match over a
/// case-insensitive one.
fn lookup<'a>(record: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    record
        .get(key)
        .or_else(|| record.iter().find(|(k, _)| k.to_lowercase() == key).map(|(_, v)| v))
}

/// Numbers, and strings that parse as finite numbers.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn decode(raw: &[u8]) -> Result<Map<String, Value>, IngestError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| IngestError::MalformedPayload { reason: e.to_string() })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(IngestError::MalformedPayload {
            reason: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Ingestion counters.
#[derive(Default)]
struct PipelineStats {
    accepted: AtomicU64,
    rejected: AtomicU64,
    defaulted_fields: AtomicU64,
    last_error: ArcSwapOption<IngestError>,
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub accepted: u64,
    pub rejected: u64,
    pub defaulted_fields: u64,
    pub last_error: Option<String>,
}

/// Decodes raw payloads and records them into per-metric series.
pub struct IngestionPipeline {
    bindings: Vec<MetricBinding>,
    state: PipelineState,
    stats: PipelineStats,
    diagnostics: Arc<Diagnostics>,
    /// Serializes writers; readers never take it.
    write_gate: Mutex<()>,
}

impl IngestionPipeline {
    /// Build a pipeline with one series per configured metric.
    pub fn new(config: &Config) -> Self {
        Self::with_metrics(&config.metrics, config.capacity, config.diagnostics_capacity)
    }

    /// Build a pipeline from an explicit metric list.
    ///
    /// Metrics whose normalized name repeats an earlier one are ignored, so
    /// every series receives exactly one sample per accepted payload.
    pub fn with_metrics(metrics: &[MetricSpec], capacity: usize, diagnostics_capacity: usize) -> Self {
        let mut bindings: Vec<MetricBinding> = Vec::with_capacity(metrics.len());
        for spec in metrics {
            let binding = MetricBinding::from_spec(spec);
            if bindings.iter().any(|b| b.name == binding.name) {
                warn!(metric = %spec.name, "Ignoring duplicate metric");
                continue;
            }
            bindings.push(binding);
        }
        let state = PipelineState::new(bindings.iter().map(|b| b.name.as_str()), capacity);

        Self {
            bindings,
            state,
            stats: PipelineStats::default(),
            diagnostics: Arc::new(Diagnostics::new(diagnostics_capacity)),
            write_gate: Mutex::new(()),
        }
    }

    /// Decode one payload and append a sample to every series.
    ///
    /// Missing or non-numeric fields take the metric's configured default.
    /// On error no series is modified.
    pub fn ingest(&self, raw: &[u8]) -> Result<(), IngestError> {
        let record = match decode(raw) {
            Ok(record) => record,
            Err(e) => {
                self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                self.stats.last_error.store(Some(Arc::new(e.clone())));
                telemetry::record_ingest_rejected(e.kind());
                return Err(e);
            }
        };
        trace!(?record, "Decoded payload");

        let mut fields = BTreeMap::new();
        for binding in &self.bindings {
            let value = binding.extract(&record).unwrap_or_else(|| {
                debug!(metric = %binding.name, default = binding.default, "Field missing, using default");
                self.stats.defaulted_fields.fetch_add(1, Ordering::Relaxed);
                telemetry::record_field_defaulted(&binding.name);
                binding.default
            });
            fields.insert(binding.name.clone(), value);
        }

        let sample = Arc::new(Sample::now(fields));
        {
            let _gate = self.write_gate.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            for binding in &self.bindings {
                if let Some(series) = self.state.series.get(&binding.name) {
                    series.push_shared(Arc::clone(&sample));
                    telemetry::set_series_len(&binding.name, series.len());
                }
            }
        }

        self.stats.accepted.fetch_add(1, Ordering::Relaxed);
        telemetry::record_ingest_accepted();
        Ok(())
    }

    /// Series for a metric (case-insensitive).
    pub fn series(&self, name: &str) -> Option<&MetricSeries> {
        self.state.get(name)
    }

    /// Normalized metric names in configuration order.
    pub fn metric_names(&self) -> Vec<String> {
        self.bindings.iter().map(|b| b.name.clone()).collect()
    }

    pub fn capacity(&self) -> usize {
        self.bindings
            .first()
            .and_then(|b| self.state.series.get(&b.name))
            .map(|s| s.capacity())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            accepted: self.stats.accepted.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            defaulted_fields: self.stats.defaulted_fields.load(Ordering::Relaxed),
            last_error: self.stats.last_error.load_full().map(|e| e.to_string()),
        }
    }

    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }
}

impl std::fmt::Debug for IngestionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestionPipeline")
            .field("metrics", &self.metric_names())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> IngestionPipeline {
        IngestionPipeline::new(&Config::default())
    }

    fn values(pipeline: &IngestionPipeline, metric: &str) -> Vec<f64> {
        pipeline
            .series(metric)
            .unwrap()
            .snapshot()
            .iter()
            .map(|s| s.value(metric).unwrap())
            .collect()
    }

    #[test]
    fn test_ingest_updates_every_series() {
        let pipeline = pipeline();
        pipeline.ingest(br#"{"Temperatura": 21.5, "Humedad": 55.0}"#).unwrap();

        assert_eq!(values(&pipeline, "temperatura"), vec![21.5]);
        assert_eq!(values(&pipeline, "humedad"), vec![55.0]);
        assert_eq!(pipeline.stats().accepted, 1);
    }

    #[test]
    fn test_key_casing_is_ignored() {
        let upper = pipeline();
        let lower = pipeline();
        upper.ingest(br#"{"Temperatura": 21.5, "Humedad": 55.0}"#).unwrap();
        lower.ingest(br#"{"temperatura": 21.5, "humedad": 55.0}"#).unwrap();

        let a = upper.series("temperatura").unwrap().latest().unwrap();
        let b = lower.series("temperatura").unwrap().latest().unwrap();
        assert_eq!(a.fields(), b.fields());
    }

    #[test]
    fn test_missing_field_uses_default() {
        let pipeline = pipeline();
        pipeline.ingest(br#"{"Temperatura": 21.5}"#).unwrap();

        assert_eq!(values(&pipeline, "humedad"), vec![0.0]);
        assert_eq!(pipeline.stats().defaulted_fields, 1);
    }

    #[test]
    fn test_configured_default_and_alias() {
        let metrics = vec![
            MetricSpec::new("temperatura").with_alias("temperature"),
            MetricSpec::new("humedad").with_default(-1.0),
        ];
        let pipeline = IngestionPipeline::with_metrics(&metrics, 10, 10);
        pipeline.ingest(br#"{"Temperature": 19.0}"#).unwrap();

        assert_eq!(values(&pipeline, "temperatura"), vec![19.0]);
        assert_eq!(values(&pipeline, "humedad"), vec![-1.0]);
    }

    #[test]
    fn test_numeric_strings_and_garbage_values() {
        let pipeline = pipeline();
        pipeline.ingest(br#"{"Temperatura": "22.25", "Humedad": true}"#).unwrap();

        assert_eq!(values(&pipeline, "temperatura"), vec![22.25]);
        assert_eq!(values(&pipeline, "humedad"), vec![0.0]);
    }

    #[test]
    fn test_exact_key_wins_over_case_variant() {
        let pipeline = pipeline();
        pipeline.ingest(br#"{"Temperatura": 1.0, "temperatura": 2.0}"#).unwrap();
        assert_eq!(values(&pipeline, "temperatura"), vec![2.0]);
    }

    #[test]
    fn test_malformed_payload_leaves_series_untouched() {
        let pipeline = pipeline();
        pipeline.ingest(br#"{"Temperatura": 20.0, "Humedad": 50.0}"#).unwrap();
        let before_temp = pipeline.series("temperatura").unwrap().snapshot();
        let before_hum = pipeline.series("humedad").unwrap().snapshot();

        let payloads: [&[u8]; 5] = [b"{not json", b"", b"[1, 2, 3]", b"42", &[0xff, 0xfe, 0x00]];
        for raw in payloads {
            let err = pipeline.ingest(raw).unwrap_err();
            assert!(matches!(err, IngestError::MalformedPayload { .. }));
        }

        assert_eq!(pipeline.series("temperatura").unwrap().snapshot(), before_temp);
        assert_eq!(pipeline.series("humedad").unwrap().snapshot(), before_hum);

        let stats = pipeline.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 5);
        assert!(stats.last_error.is_some());
    }

    #[test]
    fn test_capacity_bound() {
        let pipeline = IngestionPipeline::with_metrics(&[MetricSpec::new("t")], 3, 3);
        for i in 0..10 {
            pipeline.ingest(format!(r#"{{"t": {}}}"#, i).as_bytes()).unwrap();
        }
        assert_eq!(values(&pipeline, "t"), vec![7.0, 8.0, 9.0]);
        assert_eq!(pipeline.capacity(), 3);
    }

    #[test]
    fn test_duplicate_metrics_share_one_binding() {
        let mut config = Config::default();
        config.metrics.push(MetricSpec::new("Temperatura"));
        config.metrics.push(MetricSpec::new(" temperatura "));
        let pipeline = IngestionPipeline::new(&config);

        pipeline.ingest(br#"{"Temperatura": 1.0, "Humedad": 2.0}"#).unwrap();
        assert_eq!(values(&pipeline, "temperatura"), vec![1.0]);
        assert_eq!(values(&pipeline, "humedad"), vec![2.0]);
        assert_eq!(pipeline.metric_names(), vec!["temperatura", "humedad"]);
    }

    #[test]
    fn test_series_lookup_is_case_insensitive() {
        let pipeline = pipeline();
        assert!(pipeline.series("Temperatura").is_some());
        assert!(pipeline.series("presion").is_none());
        assert_eq!(pipeline.metric_names(), vec!["temperatura", "humedad"]);
    }
}
