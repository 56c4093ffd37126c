//! Ties each decoded estimate to a consumer span and a counter observation.

use crate::aggregator::Aggregator;
use crate::codec::Estimate;
use opentelemetry::metrics::{Counter, Meter};
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{Span as _, SpanKind, Status, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_aws_messaging::{MessageExtractor, MetadataBag};
use std::sync::Arc;
use thiserror::Error;

pub const MESSAGING_SYSTEM: &str = "aws_sqs";
pub const BRAND_COUNT_METRIC: &str = "custom.metric.brand.count";
pub const BRAND_COUNT_DESCRIPTION: &str = "Count the number of estimates per brand";
pub const BRAND_NAME_ATTRIBUTE: &str = "custom.metric.brand.name";

pub type SharedPropagator = Arc<dyn TextMapPropagator + Send + Sync>;

#[derive(Debug, Error)]
pub enum CorrelationError {
    #[error("failed to record count for brand {group_key}: {reason}")]
    MetricEmission { group_key: String, reason: String },
}

/// Records one counter observation per processed estimate.
pub trait CountRecorder: Send + Sync {
    fn record(&self, group_key: &str) -> Result<(), CorrelationError>;
}

/// [`CountRecorder`] backed by an OpenTelemetry `u64` counter.
///
/// The SDK buffers observations and exports them from its own reader, so
/// `record` itself cannot observe an export failure.
pub struct OtelCountRecorder {
    counter: Counter<u64>,
}

impl OtelCountRecorder {
    pub fn new(meter: &Meter) -> Self {
        let counter = meter
            .u64_counter(BRAND_COUNT_METRIC)
            .with_description(BRAND_COUNT_DESCRIPTION)
            .build();
        Self { counter }
    }
}

impl CountRecorder for OtelCountRecorder {
    fn record(&self, group_key: &str) -> Result<(), CorrelationError> {
        self.counter
            .add(1, &[KeyValue::new(BRAND_NAME_ATTRIBUTE, group_key.to_string())]);
        Ok(())
    }
}

/// Per-message span and metric lifecycle.
///
/// The tracer, propagator and recorder are injected so nothing here reaches
/// for process-wide telemetry state.
pub struct Correlator<T: Tracer, R: CountRecorder = OtelCountRecorder> {
    tracer: T,
    propagator: SharedPropagator,
    recorder: R,
    aggregator: Arc<Aggregator>,
    topic: String,
}

impl<T: Tracer, R: CountRecorder> Correlator<T, R> {
    pub fn new(
        tracer: T,
        propagator: SharedPropagator,
        recorder: R,
        aggregator: Arc<Aggregator>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            tracer,
            propagator,
            recorder,
            aggregator,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Processes one decoded estimate and returns the brand's new count.
    ///
    /// The span is ended on both paths. The count is not rolled back when the
    /// metric cannot be recorded.
    pub fn on_message<B>(&self, metadata: &B, estimate: &Estimate) -> Result<u64, CorrelationError>
    where
        B: MetadataBag + ?Sized,
    {
        let parent_cx = self
            .propagator
            .extract_with_context(&Context::new(), &MessageExtractor::new(metadata));

        let mut span = self
            .tracer
            .span_builder(format!("{} receive", self.topic))
            .with_kind(SpanKind::Consumer)
            .with_attributes([
                KeyValue::new("messaging.system", MESSAGING_SYSTEM),
                KeyValue::new("messaging.destination.kind", "topic"),
                KeyValue::new("messaging.destination.name", self.topic.clone()),
            ])
            .start_with_context(&self.tracer, &parent_cx);

        let count = self.aggregator.increment(&estimate.group_key);
        let recorded = self.recorder.record(&estimate.group_key);

        match &recorded {
            Ok(()) => {
                tracing::debug!(brand = %estimate.group_key, count, "recorded brand count");
            }
            Err(e) => {
                span.set_status(Status::error(e.to_string()));
            }
        }
        span.end();

        recorded.map(|()| count)
    }
}
