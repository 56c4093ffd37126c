//! SQS message attribute binding for [`MetadataBag`].
//!
//! Consumers receive trace headers as SQS string attributes when the topic
//! subscription uses raw message delivery.

use crate::MetadataBag;
use aws_sdk_sqs::types::MessageAttributeValue;
use std::collections::HashMap;

/// SQS attributes as a metadata bag.
///
/// Non-string attributes read as absent and are left out of the key listing.
///
/// # Example
///
/// ```ignore
/// use opentelemetry::global;
/// use opentelemetry::trace::{SpanKind, Tracer};
/// use opentelemetry_aws_messaging::MessageExtractor;
///
/// let attrs = msg.message_attributes().cloned().unwrap_or_default();
/// let parent_cx = global::get_text_map_propagator(|propagator| {
///     propagator.extract(&MessageExtractor::new(&attrs))
/// });
///
/// let span = tracer
///     .span_builder("estimates receive")
///     .with_kind(SpanKind::Consumer)
///     .start_with_context(&tracer, &parent_cx);
/// ```
impl MetadataBag for HashMap<String, MessageAttributeValue> {
    fn get_property(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.string_value())
    }

    fn set_property(&mut self, key: &str, value: String) {
        self.insert(
            key.to_string(),
            MessageAttributeValue::builder()
                .data_type("String")
                .string_value(value)
                .build()
                .expect("MessageAttributeValue build should not fail with valid String data_type"),
        );
    }

    fn property_keys(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, v)| v.string_value().is_some())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}
