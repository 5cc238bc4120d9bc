//! Logging service

use crate::models::{ChatId, LogLevel};
use tracing_subscriber::EnvFilter;

/// Initialize logging with the specified level. `RUST_LOG` takes precedence when set.
pub fn init_logging(level: LogLevel) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = match level {
        LogLevel::Error => "shiftreport=error,shiftreport_core=error",
        LogLevel::Warn => "shiftreport=warn,shiftreport_core=warn",
        LogLevel::Info => "shiftreport=info,shiftreport_core=info",
        LogLevel::Debug => "shiftreport=debug,shiftreport_core=debug",
        LogLevel::Trace => "shiftreport=trace,shiftreport_core=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()?;

    Ok(())
}

/// Log a session lifecycle event
pub fn log_session_event(event_type: &str, chat: ChatId, details: &str) {
    tracing::info!(
        event_type = event_type,
        chat_id = chat.0,
        details = details,
        "Session event"
    );
}

/// Log a security event (always logged regardless of level)
pub fn log_security_event(event_type: &str, chat: ChatId, details: &str) {
    tracing::warn!(
        event_type = event_type,
        chat_id = chat.0,
        details = details,
        "Security event"
    );
}

/// Log a system error
pub fn log_error(error: &str, context: Option<&str>) {
    tracing::error!(
        error = error,
        context = context.unwrap_or(""),
        "System error occurred"
    );
}
