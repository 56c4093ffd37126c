//! OpenTelemetry context propagation carriers for message metadata.
//!
//! Any metadata store that implements [`MetadataBag`] can carry trace context
//! across a messaging boundary. [`MessageCarrier`] adapts a mutable bag to both
//! the [`Injector`] and [`Extractor`] traits, so the same view serves producers
//! and consumers. [`MessageExtractor`] is the read-only variant for consumers
//! that only hold a shared reference.
//!
//! # Features
//!
//! - `sns` - Implements [`MetadataBag`] for SNS message attributes (enabled by default)
//! - `sqs` - Implements [`MetadataBag`] for SQS message attributes (enabled by default)
//!
//! # Example
//!
//! ## Publishing with trace context
//!
//! ```ignore
//! use opentelemetry::global;
//! use opentelemetry_aws_messaging::MessageCarrier;
//! use std::collections::HashMap;
//!
//! let mut attributes = HashMap::new();
//! global::get_text_map_propagator(|propagator| {
//!     propagator.inject_context(&cx, &mut MessageCarrier::new(&mut attributes));
//! });
//! // Use `attributes` in your publish call
//! ```
//!
//! ## Consuming with trace context
//!
//! ```ignore
//! use opentelemetry::global;
//! use opentelemetry_aws_messaging::MessageExtractor;
//!
//! let parent_cx = global::get_text_map_propagator(|propagator| {
//!     propagator.extract(&MessageExtractor::new(&properties))
//! });
//! // Use `parent_cx` to create child spans
//! ```

use opentelemetry::propagation::{Extractor, Injector};
use std::collections::HashMap;

#[cfg(feature = "sns")]
pub mod sns;

#[cfg(feature = "sqs")]
pub mod sqs;

/// String-keyed message metadata that can hold propagation headers.
///
/// `get_property` never fails for a missing key; it reports absence with `None`.
/// `set_property` overwrites any previous value for the key.
pub trait MetadataBag {
    fn get_property(&self, key: &str) -> Option<&str>;

    fn set_property(&mut self, key: &str, value: String);

    /// Keys currently present in the bag, in no particular order.
    fn property_keys(&self) -> Vec<&str>;
}

impl MetadataBag for HashMap<String, String> {
    fn get_property(&self, key: &str) -> Option<&str> {
        self.get(key).map(String::as_str)
    }

    fn set_property(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), value);
    }

    fn property_keys(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }
}

/// A read/write view over one message's metadata.
///
/// Holds nothing but the borrow; writes land in the underlying bag.
pub struct MessageCarrier<'a, B: MetadataBag + ?Sized>(pub &'a mut B);

impl<'a, B: MetadataBag + ?Sized> MessageCarrier<'a, B> {
    pub fn new(bag: &'a mut B) -> Self {
        Self(bag)
    }
}

impl<B: MetadataBag + ?Sized> Extractor for MessageCarrier<'_, B> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get_property(key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.property_keys()
    }
}

impl<B: MetadataBag + ?Sized> Injector for MessageCarrier<'_, B> {
    fn set(&mut self, key: &str, value: String) {
        self.0.set_property(key, value);
    }
}

/// A read-only view over one message's metadata.
pub struct MessageExtractor<'a, B: MetadataBag + ?Sized>(pub &'a B);

impl<'a, B: MetadataBag + ?Sized> MessageExtractor<'a, B> {
    pub fn new(bag: &'a B) -> Self {
        Self(bag)
    }
}

impl<B: MetadataBag + ?Sized> Extractor for MessageExtractor<'_, B> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get_property(key)
    }

    fn keys(&self) -> Vec<&str> {
        self.0.property_keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::propagation::TextMapPropagator;
    use opentelemetry::trace::{
        SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState,
    };
    use opentelemetry::Context;
    use opentelemetry_sdk::propagation::TraceContextPropagator;

    #[test]
    fn test_set_then_get_returns_value() {
        let mut props: HashMap<String, String> = HashMap::new();
        let mut carrier = MessageCarrier::new(&mut props);

        carrier.set("traceparent", "00-abc123-def456-01".to_string());

        assert_eq!(carrier.get("traceparent"), Some("00-abc123-def456-01"));
        assert_eq!(props.get("traceparent").map(String::as_str), Some("00-abc123-def456-01"));
    }

    #[test]
    fn test_get_missing_key_is_none() {
        let mut props: HashMap<String, String> = HashMap::new();
        let carrier = MessageCarrier::new(&mut props);

        assert_eq!(carrier.get("nonexistent"), None);
    }

    #[test]
    fn test_set_last_write_wins() {
        let mut props: HashMap<String, String> = HashMap::new();
        let mut carrier = MessageCarrier::new(&mut props);

        carrier.set("key", "value1".to_string());
        carrier.set("key", "value2".to_string());

        assert_eq!(carrier.get("key"), Some("value2"));
        assert_eq!(props.len(), 1);
    }

    #[test]
    fn test_keys_lists_every_property() {
        let mut props: HashMap<String, String> = HashMap::new();
        props.insert("traceparent".to_string(), "tp".to_string());
        props.insert("baggage".to_string(), "k=v".to_string());

        let extractor = MessageExtractor::new(&props);
        let mut keys = extractor.keys();
        keys.sort();

        assert_eq!(keys, vec!["baggage", "traceparent"]);
    }

    #[test]
    fn test_context_survives_inject_and_extract() {
        let span_context = SpanContext::new(
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap(),
            SpanId::from_hex("00f067aa0ba902b7").unwrap(),
            TraceFlags::SAMPLED,
            true,
            TraceState::default(),
        );
        let cx = Context::new().with_remote_span_context(span_context.clone());
        let propagator = TraceContextPropagator::new();

        let mut props: HashMap<String, String> = HashMap::new();
        propagator.inject_context(&cx, &mut MessageCarrier::new(&mut props));
        let extracted = propagator.extract(&MessageExtractor::new(&props));

        assert_eq!(
            props.get("traceparent").map(String::as_str),
            Some("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01")
        );
        assert_eq!(extracted.span().span_context().trace_id(), span_context.trace_id());
        assert_eq!(extracted.span().span_context().span_id(), span_context.span_id());
    }

    #[test]
    fn test_extract_without_headers_yields_no_parent() {
        let props: HashMap<String, String> = HashMap::new();
        let extracted = TraceContextPropagator::new().extract(&MessageExtractor::new(&props));

        assert!(!extracted.span().span_context().is_valid());
    }
}
