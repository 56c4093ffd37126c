//! Brand analytics: consumes price estimates from an SNS topic through an SQS
//! queue, keeps a running count per brand, and reports each count as a
//! counter metric and a consumer span linked to the producer's trace.

pub mod aggregator;
pub mod codec;
pub mod config;
pub mod consumer;
pub mod correlator;
pub mod sqs;
pub mod subscription;
pub mod telemetry;

pub use aggregator::Aggregator;
pub use codec::{decode, encode, DecodeError, Estimate};
pub use consumer::{ConsumptionLoop, LoopReport};
pub use correlator::{CorrelationError, Correlator, CountRecorder, OtelCountRecorder};
pub use subscription::{Delivery, Subscription, SubscriptionError};
