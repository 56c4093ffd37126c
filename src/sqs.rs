//! SQS-backed subscription to the SNS topic.
//!
//! Every process instance polls the same queue, which spreads the topic's
//! messages across instances. Deleting a message is the acknowledgement;
//! anything left alone reappears once its visibility timeout lapses.

use crate::subscription::{Delivery, Subscription, SubscriptionError};
use aws_sdk_sqs::types::{Message, MessageSystemAttributeName};
use aws_sdk_sqs::Client as SqsClient;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::sleep;

const MAX_MESSAGES: i32 = 10;
const WAIT_TIME_SECONDS: i32 = 20;
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

pub struct SqsSubscription {
    client: SqsClient,
    queue_url: String,
}

impl SqsSubscription {
    pub fn new(client: SqsClient, queue_url: String) -> Self {
        Self { client, queue_url }
    }

    /// Fails when the queue cannot be reached, so startup can abort before any
    /// message is pulled.
    pub async fn probe(&self) -> anyhow::Result<()> {
        self.client
            .get_queue_attributes()
            .queue_url(&self.queue_url)
            .send()
            .await?;
        Ok(())
    }

    /// Starts long-polling into a bounded channel. The sender is dropped when
    /// `shutdown` flips to `true` or after an unrecoverable error has been
    /// forwarded, which closes the consumer's input.
    pub fn spawn_poller(
        &self,
        capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> (
        JoinHandle<()>,
        mpsc::Receiver<Result<Delivery, SubscriptionError>>,
    ) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = tokio::spawn(poll(
            self.client.clone(),
            self.queue_url.clone(),
            tx,
            shutdown,
        ));
        (handle, rx)
    }
}

impl Subscription for SqsSubscription {
    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), SubscriptionError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&delivery.receipt_handle)
            .send()
            .await
            .map_err(|e| SubscriptionError::Acknowledge {
                message_id: delivery.message_id.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(message_id = %delivery.message_id, "message deleted from queue");
        Ok(())
    }

    async fn close(&self) {
        tracing::info!(queue_url = %self.queue_url, "subscription closed");
    }
}

async fn poll(
    client: SqsClient,
    queue_url: String,
    tx: mpsc::Sender<Result<Delivery, SubscriptionError>>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(queue_url = %queue_url, "polling for messages");

    while !*shutdown.borrow() {
        let request = client
            .receive_message()
            .queue_url(&queue_url)
            .max_number_of_messages(MAX_MESSAGES)
            .wait_time_seconds(WAIT_TIME_SECONDS)
            .message_attribute_names("All")
            .message_system_attribute_names(MessageSystemAttributeName::MessageGroupId)
            .send();

        let response = tokio::select! {
            _ = shutdown.changed() => break,
            response = request => response,
        };

        match response {
            Ok(output) => {
                for msg in output.messages.unwrap_or_default() {
                    let Some(delivery) = into_delivery(msg) else {
                        continue;
                    };
                    if tx.send(Ok(delivery)).await.is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                let missing = e
                    .as_service_error()
                    .is_some_and(|se| se.is_queue_does_not_exist());
                if missing {
                    let _ = tx
                        .send(Err(SubscriptionError::QueueMissing {
                            queue_url: queue_url.clone(),
                        }))
                        .await;
                    return;
                }
                tracing::warn!(error = %e, "error receiving messages, retrying");
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = sleep(RETRY_BACKOFF) => {}
                }
            }
        }
    }

    tracing::info!("poller stopped");
}

/// Converts an SQS message, unwrapping an SNS notification envelope when the
/// subscription does not use raw delivery.
fn into_delivery(msg: Message) -> Option<Delivery> {
    let Some(receipt_handle) = msg.receipt_handle().map(str::to_string) else {
        tracing::warn!(message_id = ?msg.message_id(), "message without receipt handle");
        return None;
    };
    let message_id = msg.message_id().unwrap_or_default().to_string();
    let routing_key = msg
        .attributes()
        .and_then(|attrs| attrs.get(&MessageSystemAttributeName::MessageGroupId))
        .cloned();
    let body = msg.body().unwrap_or_default();

    let (payload, properties) = match sns_envelope(body) {
        Some(unwrapped) => unwrapped,
        None => {
            let properties = msg
                .message_attributes()
                .map(|attrs| {
                    attrs
                        .iter()
                        .filter_map(|(k, v)| Some((k.clone(), v.string_value()?.to_string())))
                        .collect()
                })
                .unwrap_or_default();
            (body.as_bytes().to_vec(), properties)
        }
    };

    Some(Delivery {
        message_id,
        receipt_handle,
        payload,
        properties,
        routing_key,
    })
}

fn sns_envelope(body: &str) -> Option<(Vec<u8>, HashMap<String, String>)> {
    let envelope: serde_json::Value = serde_json::from_str(body).ok()?;
    if envelope.get("Type").and_then(|t| t.as_str()) != Some("Notification") {
        return None;
    }
    let message = envelope.get("Message")?.as_str()?;

    let properties = envelope
        .get("MessageAttributes")
        .and_then(|attrs| attrs.as_object())
        .map(|attrs| {
            attrs
                .iter()
                .filter(|(_, v)| v.get("Type").and_then(|t| t.as_str()) == Some("String"))
                .filter_map(|(k, v)| Some((k.clone(), v.get("Value")?.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Some((message.as_bytes().to_vec(), properties))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_sqs::types::MessageAttributeValue;

    const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn test_raw_delivery_reads_message_attributes() {
        let msg = Message::builder()
            .message_id("m1")
            .receipt_handle("rh1")
            .body(r#"{"brand":"acme","price":10.5}"#)
            .message_attributes(
                "traceparent",
                MessageAttributeValue::builder()
                    .data_type("String")
                    .string_value(TRACEPARENT)
                    .build()
                    .unwrap(),
            )
            .attributes(MessageSystemAttributeName::MessageGroupId, "acme")
            .build();

        let delivery = into_delivery(msg).unwrap();

        assert_eq!(delivery.message_id, "m1");
        assert_eq!(delivery.receipt_handle, "rh1");
        assert_eq!(delivery.payload, br#"{"brand":"acme","price":10.5}"#);
        assert_eq!(
            delivery.properties.get("traceparent").map(String::as_str),
            Some(TRACEPARENT)
        );
        assert_eq!(delivery.routing_key.as_deref(), Some("acme"));
    }

    #[test]
    fn test_sns_envelope_is_unwrapped() {
        let body = serde_json::json!({
            "Type": "Notification",
            "MessageId": "abc",
            "Message": r#"{"brand":"acme","price":12.0}"#,
            "MessageAttributes": {
                "traceparent": { "Type": "String", "Value": TRACEPARENT },
                "blob": { "Type": "Binary", "Value": "AAEC" }
            }
        })
        .to_string();
        let msg = Message::builder()
            .message_id("m2")
            .receipt_handle("rh2")
            .body(body)
            .build();

        let delivery = into_delivery(msg).unwrap();

        assert_eq!(delivery.payload, br#"{"brand":"acme","price":12.0}"#);
        assert_eq!(delivery.properties.len(), 1);
        assert_eq!(
            delivery.properties.get("traceparent").map(String::as_str),
            Some(TRACEPARENT)
        );
        assert_eq!(delivery.routing_key, None);
    }

    #[test]
    fn test_non_notification_json_is_kept_raw() {
        let msg = Message::builder()
            .receipt_handle("rh3")
            .body(r#"{"Type":"SubscriptionConfirmation","Message":"hello"}"#)
            .build();

        let delivery = into_delivery(msg).unwrap();

        assert_eq!(
            delivery.payload,
            br#"{"Type":"SubscriptionConfirmation","Message":"hello"}"#
        );
    }

    #[test]
    fn test_message_without_receipt_handle_is_skipped() {
        let msg = Message::builder().body("{}").build();

        assert!(into_delivery(msg).is_none());
    }
}
