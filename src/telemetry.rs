//! Tracing, metrics and log bootstrap.
//!
//! Spans and metrics leave the process over OTLP/gRPC. Log events go to
//! stdout through `tracing-subscriber` and are attached to the active
//! `tracing` span through `tracing-opentelemetry`.

use crate::config::TelemetryConfig;
use crate::correlator::SharedPropagator;
use anyhow::{Context, Result};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, InstrumentationScope, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::{Sampler, SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use std::sync::Arc;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// W3C trace context plus baggage, the headers carried in message attributes.
pub fn propagator() -> TextMapCompositePropagator {
    TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ])
}

/// Handles created at startup and passed explicitly to the pipeline.
pub struct Telemetry {
    service_name: String,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
    propagator: SharedPropagator,
}

impl Telemetry {
    pub fn tracer(&self) -> SdkTracer {
        self.tracer_provider.tracer(self.service_name.clone())
    }

    pub fn meter(&self) -> opentelemetry::metrics::Meter {
        use opentelemetry::metrics::MeterProvider as _;
        self.meter_provider.meter_with_scope(
            InstrumentationScope::builder(self.service_name.clone())
                .with_version(env!("CARGO_PKG_VERSION"))
                .build(),
        )
    }

    pub fn propagator(&self) -> SharedPropagator {
        Arc::clone(&self.propagator)
    }

    /// Flushes pending spans and metrics. Failures are logged, not returned;
    /// nothing useful can be done with them on the way out.
    pub fn shutdown(self) {
        if let Err(e) = self.tracer_provider.shutdown() {
            tracing::warn!(error = %e, "tracer provider shutdown failed");
        }
        if let Err(e) = self.meter_provider.shutdown() {
            tracing::warn!(error = %e, "meter provider shutdown failed");
        }
    }
}

/// Builds the exporters and installs the log subscriber. Any failure here is
/// fatal to startup.
pub fn init(config: &TelemetryConfig) -> Result<Telemetry> {
    let resource = Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build();

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .with_timeout(config.export_timeout)
        .build()
        .context("failed to create span exporter")?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_sampler(Sampler::AlwaysOn)
        .with_resource(resource.clone())
        .with_batch_exporter(span_exporter)
        .build();

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.otlp_endpoint.clone())
        .with_timeout(config.export_timeout)
        .build()
        .context("failed to create metric exporter")?;

    let reader = PeriodicReader::builder(metric_exporter)
        .with_interval(config.metric_interval)
        .build();

    let meter_provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();

    // Third-party instrumentation still looks these up globally.
    global::set_text_map_propagator(propagator());
    global::set_tracer_provider(tracer_provider.clone());
    global::set_meter_provider(meter_provider.clone());

    let otel_layer = OpenTelemetryLayer::new(tracer_provider.tracer(config.service_name.clone()));
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .with(otel_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(Telemetry {
        service_name: config.service_name.clone(),
        tracer_provider,
        meter_provider,
        propagator: Arc::new(propagator()),
    })
}
