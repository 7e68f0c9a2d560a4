pub mod token_counter;

use crate::config::LogFormat;
use crate::protocol::responses::ResponsesUsage;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with the configured log level and format.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (DEBUG, INFO, ERROR)
///
/// Output goes to stderr so translated events on stdout stay clean.
pub fn init_tracing(log_level: &str, format: LogFormat) {
    let Some(filter) = level_filter(log_level) else {
        return;
    };
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("INFO"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    // A second init (tests, embedding hosts) keeps the first subscriber.
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// The `EnvFilter` directive for a config log level, or `None` when disabled.
fn level_filter(log_level: &str) -> Option<String> {
    let level = log_level.to_uppercase();
    match level.as_str() {
        "DISABLED" => None,
        "WARNING" => Some("WARN".to_string()),
        "CRITICAL" => Some("ERROR".to_string()),
        _ => Some(level),
    }
}

/// Log token usage for a completed stream, computing duration from start time.
pub fn log_stream_complete(model: &str, usage: &ResponsesUsage, start_time: std::time::Instant) {
    token_counter::log_stream_usage(model, usage, start_time.elapsed());
}
