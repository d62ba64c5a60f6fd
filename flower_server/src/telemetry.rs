use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider},
    KeyValue,
};
use prometheus::{Encoder, Registry, TextEncoder};

/// Bucket edges for prediction latency, in milliseconds.
const PREDICTION_DURATION_BOUNDARIES: [f64; 14] = [
    5.0, 10.0, 20.0, 30.0, 50.0, 75.0, 100.0, 150.0, 250.0, 500.0, 1000.0, 2000.0, 5000.0,
    10000.0,
];

pub struct Metrics {
    request_counter: Counter<u64>,
    prediction_duration: Histogram<u64>,
    prediction_failures: Counter<u64>,
    registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder()
            .with_reader(exporter)
            .build();

        let meter = provider.meter("flower_server");
        global::set_meter_provider(provider);

        let request_counter = meter
            .u64_counter("requests_total")
            .with_description("Total number of requests")
            .build();

        let prediction_duration = meter
            .u64_histogram("prediction_duration_ms")
            .with_boundaries(PREDICTION_DURATION_BOUNDARIES.to_vec())
            .with_description("Duration of decode, preprocessing and inference in milliseconds")
            .build();

        let prediction_failures = meter
            .u64_counter("prediction_failures_total")
            .with_description("Failed predictions by failing stage")
            .build();

        Ok(Metrics {
            request_counter,
            prediction_duration,
            prediction_failures,
            registry,
        })
    }

    pub fn record_request(&self, route: &str) {
        let attributes = [KeyValue::new("route", route.to_string())];
        self.request_counter.add(1, &attributes);
    }

    pub fn record_prediction_duration(&self, duration_ms: u64) {
        self.prediction_duration.record(duration_ms, &[]);
    }

    pub fn record_prediction_failure(&self, kind: &'static str) {
        let attributes = [KeyValue::new("kind", kind)];
        self.prediction_failures.add(1, &attributes);
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries_are_increasing() {
        assert!(PREDICTION_DURATION_BOUNDARIES
            .windows(2)
            .all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_encode_contains_recorded_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_request("/predict");
        metrics.record_prediction_duration(42);
        metrics.record_prediction_failure("decode");

        let text = metrics.encode().unwrap();

        assert!(text.contains("requests_total"));
        assert!(text.contains("prediction_duration_ms"));
        assert!(text.contains("prediction_failures_total"));
    }
}
