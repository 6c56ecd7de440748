//! Structured logging and metrics initialization for the AI invocation plane.
//!
//! Every component records through the counters/histograms exposed here
//! rather than calling `tracing` macros ad hoc for anything that should
//! also show up as a metric.

use anyhow::Result;
use once_cell::sync::OnceCell;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    metrics::SdkMeterProvider,
    propagation::TraceContextPropagator,
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Metrics scoped to the resilient AI invocation plane. One instance is
/// created at startup and shared (via `Arc`) with every component.
pub struct Metrics {
    pub embedding_cache_hits_total: Counter<u64>,
    pub embedding_cache_misses_total: Counter<u64>,
    pub response_cache_hits_total: Counter<u64>,
    pub response_cache_misses_total: Counter<u64>,
    pub rate_limit_blocks_total: Counter<u64>,
    pub circuit_breaker_transitions_total: Counter<u64>,
    pub free_model_selection_duration: Histogram<f64>,
    pub validation_issues_total: Counter<u64>,
    pub refusal_detections_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("ai-plane");
        Self {
            embedding_cache_hits_total: meter
                .u64_counter("embedding_cache_hits_total")
                .with_description("Embedding cache hits")
                .build(),
            embedding_cache_misses_total: meter
                .u64_counter("embedding_cache_misses_total")
                .with_description("Embedding cache misses")
                .build(),
            response_cache_hits_total: meter
                .u64_counter("response_cache_hits_total")
                .with_description("Model response cache hits")
                .build(),
            response_cache_misses_total: meter
                .u64_counter("response_cache_misses_total")
                .with_description("Model response cache misses")
                .build(),
            rate_limit_blocks_total: meter
                .u64_counter("rate_limit_blocks_total")
                .with_description("Calls rejected because a model was locally rate-limited")
                .build(),
            circuit_breaker_transitions_total: meter
                .u64_counter("circuit_breaker_transitions_total")
                .with_description("Circuit breaker state transitions")
                .build(),
            free_model_selection_duration: meter
                .f64_histogram("free_model_selection_duration_seconds")
                .with_description("Time spent selecting and invoking a free model")
                .build(),
            validation_issues_total: meter
                .u64_counter("validation_issues_total")
                .with_description("Response validation issues, by severity")
                .build(),
            refusal_detections_total: meter
                .u64_counter("refusal_detections_total")
                .with_description("Refusal detections, by source (llm vs fallback)")
                .build(),
        }
    }
}

static METRICS: OnceCell<Metrics> = OnceCell::new();

/// Global metrics handle, lazily created on first access.
pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

/// Initialize tracing (structured logs) and an OTLP trace exporter for the
/// given service name. Should be called once, early in `main`.
pub fn init_observability(service_name: &str) -> Result<()> {
    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    let otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
        .unwrap_or_else(|_| "http://localhost:4317".to_string());

    let trace_exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&otlp_endpoint)
        .with_timeout(Duration::from_secs(10))
        .build();

    if let Ok(exporter) = trace_exporter {
        let tracer_provider = SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource.clone())
            .with_id_generator(RandomIdGenerator::default())
            .with_sampler(Sampler::AlwaysOn)
            .build();
        global::set_tracer_provider(tracer_provider);
    }

    let metric_exporter = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(&otlp_endpoint)
        .with_timeout(Duration::from_secs(10))
        .build();

    if let Ok(exporter) = metric_exporter {
        let meter_provider = SdkMeterProvider::builder()
            .with_periodic_exporter(exporter)
            .with_resource(resource)
            .build();
        global::set_meter_provider(meter_provider);
        info!("OpenTelemetry metrics initialized successfully");
    } else {
        info!("Failed to initialize OpenTelemetry metrics exporter");
    }

    global::set_text_map_propagator(TraceContextPropagator::new());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .expect("failed to initialize tracing filter layer");

    let use_json = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| "json".to_string())
        .to_lowercase()
        == "json";

    let format_layer = if use_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_target(true)
            .with_file(true)
            .flatten_event(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let tracer = global::tracer_provider().tracer(service_name.to_string());
    let otel_trace_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    Registry::default()
        .with(env_filter)
        .with(format_layer)
        .with(otel_trace_layer)
        .try_init()?;

    // Touch the metrics singleton so the first instrument registration
    // happens deterministically at startup rather than on first use.
    let _ = metrics();

    info!(service = service_name, "observability initialized");
    Ok(())
}
