use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Initialize structured tracing for the pipeline.
/// JSON output with span context gives every assignment and decision a
/// correlated, queryable trail without an external export backend.
/// RUST_LOG overrides the configured level when set.
pub fn init_telemetry() -> Result<()> {
    let observability = &crate::config::config()?.observability;
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&observability.log_level));

    if observability.json_logs {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer())
            .with(filter)
            .init();
    }

    tracing::info!("Review pipeline telemetry initialized with structured logging");
    Ok(())
}

/// Generate a correlation ID for linking related operations
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create a span with common review coordination attributes.
/// Reviewer tokens are opaque and safe to log; they carry no identity.
pub fn create_review_span(
    operation: &str,
    submission_id: Option<&str>,
    reviewer_token: Option<&str>,
    correlation_id: Option<&str>,
) -> tracing::Span {
    tracing::info_span!(
        "review_coordination",
        operation = operation,
        submission.id = submission_id,
        reviewer.token = reviewer_token,
        correlation.id = correlation_id,
        otel.kind = "internal"
    )
}

/// Shutdown telemetry gracefully
pub fn shutdown_telemetry() {
    tracing::info!("Review pipeline telemetry shutdown complete");
}
