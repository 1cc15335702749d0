use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize structured logging.
///
/// `RUST_LOG` overrides `level`. JSON output carries the current span and the
/// span list so every line of a turn can be tied back to its session.
pub fn init_telemetry(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()?;
    }

    tracing::debug!("USSD engine telemetry initialized");
    Ok(())
}

/// Generate a correlation ID for linking the log lines of one turn
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Span wrapping a single inbound turn
pub fn create_turn_span(session_id: &str, phone_number: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "turn",
        session.id = session_id,
        phone = phone_number,
        correlation.id = correlation_id,
        machine = tracing::field::Empty,
        state = tracing::field::Empty,
        version = tracing::field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_unique_uuids() {
        let first = generate_correlation_id();
        let second = generate_correlation_id();
        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }
}
