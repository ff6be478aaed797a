use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::application::context::METRIC_RENDER_UNCACHEABLE_TOTAL;
use crate::cache::{
    METRIC_REGISTRY_EVICT_TOTAL, METRIC_REGISTRY_LOOKUP_TOTAL, METRIC_REGISTRY_PERSIST_TOTAL,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the registry emits.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_REGISTRY_LOOKUP_TOTAL,
            Unit::Count,
            "Parameter registry lookups, labelled by the layer that answered."
        );
        describe_counter!(
            METRIC_REGISTRY_PERSIST_TOTAL,
            Unit::Count,
            "Parameter sets written to durable storage."
        );
        describe_counter!(
            METRIC_REGISTRY_EVICT_TOTAL,
            Unit::Count,
            "Cached parameter sets evicted due to capacity."
        );
        describe_counter!(
            METRIC_RENDER_UNCACHEABLE_TOTAL,
            Unit::Count,
            "Renders marked uncacheable after reading an undeclared parameter."
        );
    });
}
