//! Startup configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TOPIC: &str = "estimates";
pub const DEFAULT_SERVICE_NAME: &str = "analytics-layer";
pub const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub otlp_endpoint: String,
    pub export_timeout: Duration,
    pub metric_interval: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerConfig {
    pub queue_url: String,
    pub topic: String,
    pub channel_capacity: usize,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PublisherConfig {
    pub topic_arn: String,
    pub topic: String,
    pub telemetry: TelemetryConfig,
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn required(&self, var: &'static str) -> Result<String, ConfigError> {
        (self.0)(var)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing(var))
    }

    fn or(&self, var: &'static str, default: &str) -> String {
        (self.0)(var)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn parsed<T: FromStr>(&self, var: &'static str, default: T) -> Result<T, ConfigError> {
        match (self.0)(var).filter(|v| !v.is_empty()) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { var, value }),
        }
    }

    fn telemetry(&self, default_service: &str) -> Result<TelemetryConfig, ConfigError> {
        Ok(TelemetryConfig {
            service_name: self.or("SERVICE_NAME", default_service),
            otlp_endpoint: self.or("OTEL_EXPORTER_OTLP_ENDPOINT", DEFAULT_OTLP_ENDPOINT),
            export_timeout: Duration::from_secs(self.parsed("OTEL_EXPORTER_TIMEOUT_SECS", 5)?),
            metric_interval: Duration::from_secs(self.parsed("METRIC_EXPORT_INTERVAL_SECS", 5)?),
        })
    }
}

fn env_var(var: &str) -> Option<String> {
    std::env::var(var).ok()
}

impl ConsumerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);
        let channel_capacity = vars.parsed("CHANNEL_CAPACITY", DEFAULT_CHANNEL_CAPACITY)?;
        if channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "CHANNEL_CAPACITY",
                value: "0".to_string(),
            });
        }
        Ok(Self {
            queue_url: vars.required("SQS_QUEUE_URL")?,
            topic: vars.or("TOPIC_NAME", DEFAULT_TOPIC),
            channel_capacity,
            telemetry: vars.telemetry(DEFAULT_SERVICE_NAME)?,
        })
    }
}

impl PublisherConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_var)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars(lookup);
        Ok(Self {
            topic_arn: vars.required("SNS_TOPIC_ARN")?,
            topic: vars.or("TOPIC_NAME", DEFAULT_TOPIC),
            telemetry: vars.telemetry("brand-estimator")?,
        })
    }
}
