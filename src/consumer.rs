//! Drains the inbound channel one message at a time.
//!
//! Each message moves `Idle -> Processing`, then either back to `Idle`
//! without an acknowledgement (decode or correlation failure) or through
//! `Acknowledging` to `Idle`. Unacknowledged messages are redelivered by the
//! broker. The loop ends when the channel closes or the subscription reports
//! an unrecoverable error.

use crate::codec;
use crate::correlator::{CountRecorder, Correlator};
use crate::subscription::{Delivery, Subscription, SubscriptionError};
use opentelemetry::trace::Tracer;
use std::fmt;
use tokio::sync::mpsc;

pub type Inbound = mpsc::Receiver<Result<Delivery, SubscriptionError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Processing,
    Acknowledging,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Processing => f.write_str("processing"),
            Self::Acknowledging => f.write_str("acknowledging"),
        }
    }
}

/// How a single message left the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Acknowledged,
    /// Payload did not decode; left for redelivery.
    Rejected,
    /// Correlation or acknowledgement failed; left for redelivery.
    Failed,
}

/// Totals for one run of the loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub received: u64,
    pub acknowledged: u64,
    pub rejected: u64,
    pub failed: u64,
}

impl LoopReport {
    fn tally(&mut self, outcome: Outcome) {
        self.received += 1;
        match outcome {
            Outcome::Acknowledged => self.acknowledged += 1,
            Outcome::Rejected => self.rejected += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

pub struct ConsumptionLoop<T: Tracer, R: CountRecorder, S: Subscription> {
    correlator: Correlator<T, R>,
    subscription: S,
    inbound: Inbound,
    state: LoopState,
}

impl<T: Tracer, R: CountRecorder, S: Subscription> ConsumptionLoop<T, R, S> {
    pub fn new(correlator: Correlator<T, R>, subscription: S, inbound: Inbound) -> Self {
        Self {
            correlator,
            subscription,
            inbound,
            state: LoopState::Idle,
        }
    }

    /// Runs until the inbound channel closes. The subscription is closed
    /// before returning on every path.
    pub async fn run(mut self) -> Result<LoopReport, SubscriptionError> {
        let mut report = LoopReport::default();
        tracing::info!(topic = self.correlator.topic(), "consumption loop started");

        while let Some(next) = self.inbound.recv().await {
            match next {
                Ok(delivery) => {
                    let outcome = self.process(&delivery).await;
                    report.tally(outcome);
                }
                Err(e) => {
                    tracing::error!(error = %e, "subscription failed, stopping consumption loop");
                    self.subscription.close().await;
                    return Err(e);
                }
            }
        }

        self.subscription.close().await;
        tracing::info!(
            received = report.received,
            acknowledged = report.acknowledged,
            rejected = report.rejected,
            failed = report.failed,
            "consumption loop drained"
        );
        Ok(report)
    }

    async fn process(&mut self, delivery: &Delivery) -> Outcome {
        self.transition(LoopState::Processing);

        let outcome = match codec::decode(&delivery.payload) {
            Err(e) => {
                tracing::warn!(
                    message_id = %delivery.message_id,
                    error = %e,
                    "dropping undecodable estimate without acknowledgement"
                );
                Outcome::Rejected
            }
            Ok(estimate) => match self.correlator.on_message(delivery, &estimate) {
                Err(e) => {
                    tracing::warn!(
                        message_id = %delivery.message_id,
                        error = %e,
                        "leaving estimate unacknowledged"
                    );
                    Outcome::Failed
                }
                Ok(count) => {
                    tracing::info!(brand = %estimate.group_key, count, "count for brand");
                    self.transition(LoopState::Acknowledging);
                    match self.subscription.acknowledge(delivery).await {
                        Ok(()) => Outcome::Acknowledged,
                        Err(e) => {
                            tracing::warn!(error = %e, "acknowledgement failed, message will be redelivered");
                            Outcome::Failed
                        }
                    }
                }
            },
        };

        self.transition(LoopState::Idle);
        outcome
    }

    fn transition(&mut self, next: LoopState) {
        tracing::trace!(from = %self.state, to = %next, "consumption loop state");
        self.state = next;
    }
}
