//! What the consumption loop needs from a broker subscription.

use opentelemetry_aws_messaging::MetadataBag;
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;

/// One message handed over by a subscription, owned by the loop until it is
/// acknowledged or dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: String,
    /// Broker handle used to acknowledge this particular receipt.
    pub receipt_handle: String,
    pub payload: Vec<u8>,
    pub properties: HashMap<String, String>,
    pub routing_key: Option<String>,
}

impl MetadataBag for Delivery {
    fn get_property(&self, key: &str) -> Option<&str> {
        self.properties.get_property(key)
    }

    fn set_property(&mut self, key: &str, value: String) {
        self.properties.set_property(key, value);
    }

    fn property_keys(&self) -> Vec<&str> {
        self.properties.property_keys()
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("queue {queue_url} does not exist")]
    QueueMissing { queue_url: String },
    #[error("failed to receive messages: {0}")]
    Receive(String),
    #[error("failed to acknowledge message {message_id}: {reason}")]
    Acknowledge { message_id: String, reason: String },
}

/// Acknowledgement side of a subscription. Messages arrive separately, over a
/// bounded channel of `Result<Delivery, SubscriptionError>`.
pub trait Subscription: Send + Sync {
    fn acknowledge(
        &self,
        delivery: &Delivery,
    ) -> impl Future<Output = Result<(), SubscriptionError>> + Send;

    /// Releases the subscription. Called once, when the loop stops.
    ///
    /// Message delivery is not stopped here. By the time the loop calls this,
    /// the producing side has already finished: either its channel sender was
    /// dropped, or it forwarded an unrecoverable error and returned.
    fn close(&self) -> impl Future<Output = ()> + Send;
}
