use opentelemetry::global;
use opentelemetry::propagation::Injector;
use std::collections::HashMap;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Writes the current span's W3C trace context into `headers`.
pub fn inject_trace_context(headers: &mut HashMap<String, String>) {
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(&Span::current().context(), &mut HeaderInjector { headers })
    });
}

struct HeaderInjector<'a> {
    headers: &'a mut HashMap<String, String>,
}

impl Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers.insert(key.to_string(), value);
    }
}

/// Propagates the current trace to a file server on an outgoing request.
pub fn inject_trace_context_reqwest(builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    let mut headers = HashMap::new();
    inject_trace_context(&mut headers);

    headers
        .into_iter()
        .fold(builder, |builder, (key, value)| builder.header(key, value))
}
