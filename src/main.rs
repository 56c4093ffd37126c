/// Analytics consumer
/// Run with: cargo run --bin analytics-layer
use anyhow::{Context, Result};
use aws_sdk_sqs::Client as SqsClient;
use brand_analytics::config::ConsumerConfig;
use brand_analytics::sqs::SqsSubscription;
use brand_analytics::{telemetry, Aggregator, ConsumptionLoop, Correlator, OtelCountRecorder};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ConsumerConfig::from_env()?;
    let telemetry = telemetry::init(&config.telemetry)?;

    let aws = aws_config::load_from_env().await;
    let client = SqsClient::new(&aws);

    tracing::info!(queue_url = %config.queue_url, topic = %config.topic, "starting analytics layer");

    let subscription = SqsSubscription::new(client, config.queue_url.clone());
    subscription
        .probe()
        .await
        .with_context(|| format!("cannot reach SQS queue {}", config.queue_url))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(true);
    })
    .context("failed to install Ctrl+C handler")?;

    let (poller, inbound) = subscription.spawn_poller(config.channel_capacity, shutdown_rx);

    let correlator = Correlator::new(
        telemetry.tracer(),
        telemetry.propagator(),
        OtelCountRecorder::new(&telemetry.meter()),
        Arc::new(Aggregator::new()),
        config.topic.clone(),
    );

    let result = ConsumptionLoop::new(correlator, subscription, inbound)
        .run()
        .await;

    if let Err(e) = poller.await {
        tracing::warn!(error = %e, "poller task ended abnormally");
    }
    telemetry.shutdown();

    let report = result.context("subscription failed")?;
    tracing::info!(acknowledged = report.acknowledged, "analytics layer stopped");
    Ok(())
}
