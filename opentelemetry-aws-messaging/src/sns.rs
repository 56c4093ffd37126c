//! SNS message attribute binding for [`MetadataBag`].
//!
//! Lets a producer inject trace context straight into the attribute map it
//! hands to `Publish`.

use crate::MetadataBag;
use aws_sdk_sns::types::MessageAttributeValue;
use std::collections::HashMap;

fn string_attribute(value: String) -> MessageAttributeValue {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
        .expect("MessageAttributeValue build should not fail with valid String data_type")
}

/// SNS attributes as a metadata bag.
///
/// Only `String` attributes are visible to propagators; binary and number
/// attributes read as absent.
///
/// # Example
///
/// ```ignore
/// use opentelemetry::global;
/// use opentelemetry_aws_messaging::MessageCarrier;
/// use aws_sdk_sns::types::MessageAttributeValue;
/// use std::collections::HashMap;
///
/// let mut attributes: HashMap<String, MessageAttributeValue> = HashMap::new();
///
/// global::get_text_map_propagator(|propagator| {
///     propagator.inject_context(&cx, &mut MessageCarrier::new(&mut attributes));
/// });
///
/// client.publish()
///     .topic_arn(&topic_arn)
///     .message(&message_body)
///     .set_message_attributes(Some(attributes))
///     .send()
///     .await?;
/// ```
impl MetadataBag for HashMap<String, MessageAttributeValue> {
    fn get_property(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.string_value())
    }

    fn set_property(&mut self, key: &str, value: String) {
        self.insert(key.to_string(), string_attribute(value));
    }

    fn property_keys(&self) -> Vec<&str> {
        self.iter()
            .filter(|(_, v)| v.string_value().is_some())
            .map(|(k, _)| k.as_str())
            .collect()
    }
}
