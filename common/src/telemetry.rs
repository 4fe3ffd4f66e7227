use anyhow::Result;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use std::env;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "router=info,common=info";

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable. `OTEL_TRACES_EXPORTER` picks the span
/// exporter: `otlp` (HTTP), `stdout`, or none.
pub fn init_telemetry(service_name: &'static str) {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let exporter = env::var("OTEL_TRACES_EXPORTER").unwrap_or_default();

    let tracer = match exporter.as_str() {
        "otlp" => {
            let otlp_endpoint = env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
                .unwrap_or_else(|_| "http://localhost:4318/v1/traces".to_string());

            match create_otlp_tracer(&otlp_endpoint, service_name) {
                Ok(tracer) => tracer,
                Err(e) => {
                    eprintln!(
                        "Failed to initialize OTLP tracer for {}: {}",
                        service_name, e
                    );
                    eprintln!("Falling back to local-only tracing");
                    init_local_tracer(service_name)
                }
            }
        }
        "stdout" => init_stdout_tracer(service_name),
        _ => init_local_tracer(service_name),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .with(OpenTelemetryLayer::new(tracer))
        .init();
}

fn create_otlp_tracer(
    endpoint: &str,
    service_name: &'static str,
) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_otlp::WithExportConfig;

    // Only the HTTP transport is wired; gRPC collectors listen on 4317.
    if endpoint.contains("4317") {
        return Err(anyhow::anyhow!(
            "gRPC OTLP not supported, use the HTTP endpoint (port 4318)"
        ));
    }

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()?;

    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_simple_exporter(exporter)
        .build();

    Ok(provider.tracer(service_name))
}

fn init_stdout_tracer(service_name: &'static str) -> opentelemetry_sdk::trace::Tracer {
    let provider = opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build();

    provider.tracer(service_name)
}

/// Spans still carry ids for header propagation but are not exported.
fn init_local_tracer(service_name: &'static str) -> opentelemetry_sdk::trace::Tracer {
    opentelemetry_sdk::trace::SdkTracerProvider::builder()
        .build()
        .tracer(service_name)
}
