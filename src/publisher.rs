/// Brand estimator: publishes price estimates to the SNS topic
/// Run with: cargo run --bin estimator
use anyhow::{Context as _, Result};
use aws_sdk_sns::types::MessageAttributeValue;
use aws_sdk_sns::Client as SnsClient;
use brand_analytics::config::PublisherConfig;
use brand_analytics::{encode, telemetry, Estimate};
use opentelemetry::propagation::TextMapPropagator as _;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_aws_messaging::MessageCarrier;
use std::collections::HashMap;
use std::io::{self, Write};

const CATALOG: &[(&str, f64)] = &[
    ("audi", 52_000.0),
    ("bmw", 48_500.0),
    ("ferrari", 245_000.0),
    ("ford", 31_000.0),
    ("honda", 27_500.0),
    ("toyota", 29_000.0),
    ("volkswagen", 33_000.0),
];

fn estimate_for(input: &str) -> Option<Estimate> {
    let brand = input.trim().to_lowercase();
    CATALOG
        .iter()
        .find(|(name, _)| *name == brand)
        .map(|&(_, price)| Estimate {
            group_key: brand,
            value: price,
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = PublisherConfig::from_env()?;
    let telemetry = telemetry::init(&config.telemetry)?;
    let tracer = telemetry.tracer();
    let propagator = telemetry.propagator();

    let aws = aws_config::load_from_env().await;
    let client = SnsClient::new(&aws);

    println!("📌 Publishing to: {}\n", config.topic_arn);

    loop {
        print!("Enter brand (or 'quit' to exit): ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.eq_ignore_ascii_case("quit") {
            println!("👋 Goodbye!");
            break;
        }

        if input.is_empty() {
            continue;
        }

        let Some(estimate) = estimate_for(input) else {
            println!("❓ No estimate for '{}'\n", input);
            continue;
        };

        let span = tracer
            .span_builder(format!("{} send", config.topic))
            .with_kind(SpanKind::Producer)
            .with_attributes([
                KeyValue::new("messaging.system", "aws_sns"),
                KeyValue::new("messaging.destination.kind", "topic"),
                KeyValue::new("messaging.destination.name", config.topic.clone()),
            ])
            .start(&tracer);
        let cx = Context::current_with_span(span);

        let mut attributes: HashMap<String, MessageAttributeValue> = HashMap::new();
        propagator.inject_context(&cx, &mut MessageCarrier::new(&mut attributes));

        let message_body = String::from_utf8(encode(&estimate)?)?;

        match client
            .publish()
            .topic_arn(&config.topic_arn)
            .message(&message_body)
            .set_message_attributes(Some(attributes))
            .send()
            .await
            .context("Failed to publish estimate to SNS")
        {
            Ok(response) => {
                println!(
                    "✅ Published {} at {:.2}! MessageId: {:?}\n",
                    estimate.group_key,
                    estimate.value,
                    response.message_id().unwrap_or("unknown")
                );
            }
            Err(e) => {
                cx.span().set_status(Status::error(e.to_string()));
                tracing::error!(error = %e, brand = %estimate.group_key, "publish failed");
            }
        }
        cx.span().end();
    }

    telemetry.shutdown();
    Ok(())
}
