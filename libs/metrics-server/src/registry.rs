use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

use loader_api::{Metrics, Stage};

use crate::MetricsError;

/// `Metrics` поверх собственного `prometheus::Registry` (не глобального),
/// чтобы в одном процессе можно было держать несколько экземпляров.
pub struct PrometheusMetrics {
    registry: Registry,
    processed: IntCounter,
    errors: IntCounter,
    dropped: IntCounter,
    consume: Histogram,
    transform: Histogram,
    response: Histogram,
    batch: Histogram,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let processed = IntCounter::new("messages_processed_total", "Total number of processed messages")?;
        let errors = IntCounter::new("errors_total", "Total number of errors")?;
        let dropped = IntCounter::new(
            "documents_dropped_total",
            "Documents not indexed after all bulk retries",
        )?;
        let consume = histogram("consume_duration_seconds", "Time spent consuming messages")?;
        let transform = histogram("transform_duration_seconds", "Time spent transforming messages")?;
        let response = histogram("response_duration_seconds", "Time spent waiting for the index store")?;
        let batch = histogram(
            "batch_processing_duration_seconds",
            "Time spent processing the entire batch",
        )?;

        registry.register(Box::new(processed.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(dropped.clone()))?;
        registry.register(Box::new(consume.clone()))?;
        registry.register(Box::new(transform.clone()))?;
        registry.register(Box::new(response.clone()))?;
        registry.register(Box::new(batch.clone()))?;

        Ok(Self { registry, processed, errors, dropped, consume, transform, response, batch })
    }

    /// Все метрики в текстовом формате Prometheus.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn histogram_for(&self, stage: Stage) -> &Histogram {
        match stage {
            Stage::Consume => &self.consume,
            Stage::Transform => &self.transform,
            Stage::SinkWrite => &self.response,
            Stage::Batch => &self.batch,
        }
    }
}

fn histogram(name: &str, help: &str) -> Result<Histogram, prometheus::Error> {
    Histogram::with_opts(HistogramOpts::new(name, help))
}

impl Metrics for PrometheusMetrics {
    fn inc_processed(&self, n: u64) {
        self.processed.inc_by(n);
    }

    fn inc_errors(&self) {
        self.errors.inc();
    }

    fn inc_dropped(&self, n: u64) {
        self.dropped.inc_by(n);
    }

    fn observe(&self, stage: Stage, seconds: f64) {
        self.histogram_for(stage).observe(seconds);
    }
}
