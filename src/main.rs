use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use converse_bridge::config::{load_config, BridgeConfig};
use converse_bridge::convert::{
    convert_converse_to_responses, convert_responses_to_converse, ConvertOptions,
};
use converse_bridge::error::ConversionError;
use converse_bridge::observability::token_counter::{
    estimate_conversation_tokens, estimate_stream_output_tokens, merge_usage,
};
use converse_bridge::observability::{init_tracing, log_stream_complete};
use converse_bridge::protocol::converse::{ConverseConversation, ConverseStreamEvent};
use converse_bridge::protocol::responses::{ResponsesItem, ResponsesStreamEvent};
use converse_bridge::stream::{translate_responses_event, ConverseStreamSession, StreamStatePool};
use serde_json::{json, Value};

const USAGE: &str = "Usage: converse-bridge <stream|reverse|to-responses|to-converse> <input-file> [config.yaml]";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("line {line}: {message}")]
    Line { line: usize, message: String },
    #[error("conversion failed: {0}")]
    Conversion(#[from] ConversionError),
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Stream,
    Reverse,
    ToResponses,
    ToConverse,
}

impl Command {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "stream" => Some(Command::Stream),
            "reverse" => Some(Command::Reverse),
            "to-responses" => Some(Command::ToResponses),
            "to-converse" => Some(Command::ToConverse),
            _ => None,
        }
    }
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, input_path, config_path) = match args.as_slice() {
        [command, input] => (command.as_str(), input.as_str(), None),
        [command, input, config] => (command.as_str(), input.as_str(), Some(config.as_str())),
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };
    let Some(command) = Command::parse(command) else {
        eprintln!("Unknown command: {command}");
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let config = resolve_config(config_path).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration: {e}");
        std::process::exit(1);
    });
    init_tracing(&config.features.log_level, config.features.log_format);

    let input = std::fs::read_to_string(input_path).unwrap_or_else(|e| {
        eprintln!("Failed to read {input_path}: {e}");
        std::process::exit(1);
    });

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = match command {
        Command::Stream => run_stream(&input, &config, &mut out),
        Command::Reverse => run_reverse(&input, &mut out),
        Command::ToResponses => run_to_responses(&input, &config, &mut out),
        Command::ToConverse => run_to_converse(&input, &mut out),
    };
    // Flush whatever was translated, even when the run failed part way.
    let flushed = out.flush().map_err(CliError::from);
    if let Err(e) = result.and(flushed) {
        if let CliError::Conversion(err) = &e {
            tracing::warn!(category = ?err.category(), "conversion rejected input");
        }
        eprintln!("{e}");
        std::process::exit(1);
    }
}

/// An explicit config path must load; the default path is used only if present.
fn resolve_config(path: Option<&str>) -> Result<BridgeConfig, converse_bridge::config::ConfigError> {
    match path {
        Some(path) => load_config(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config(DEFAULT_CONFIG_PATH),
        None => Ok(BridgeConfig::default()),
    }
}

/// Non-empty input lines with their 1-based line numbers.
fn json_lines(input: &str) -> impl Iterator<Item = (usize, &str)> {
    input
        .lines()
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
}

/// Parse one vendor event line: either the envelope form `{"contentBlockDelta": {...}}`
/// or the named form `{"event": "contentBlockDelta", "data": {...}}`.
///
/// Only invalid JSON is an error. Lines that are not a known vendor event yield `None`.
fn parse_vendor_line(
    line_number: usize,
    line: &str,
) -> Result<Option<ConverseStreamEvent>, CliError> {
    let value: Value = serde_json::from_str(line).map_err(|e| CliError::Line {
        line: line_number,
        message: e.to_string(),
    })?;
    if let (Some(Value::String(name)), Some(data)) = (value.get("event"), value.get("data")) {
        let payload = serde_json::to_vec(data)?;
        let event = ConverseStreamEvent::from_named(name, &payload);
        if event.is_none() {
            tracing::debug!(line = line_number, event = %name, "skipping unrecognized vendor event");
        }
        return Ok(event);
    }
    match serde_json::from_value(value) {
        Ok(event) => Ok(Some(event)),
        Err(e) => {
            tracing::debug!(line = line_number, error = %e, "skipping unrecognized vendor event");
            Ok(None)
        }
    }
}

fn write_json_line(out: &mut impl Write, value: &impl serde::Serialize) -> Result<(), CliError> {
    serde_json::to_writer(&mut *out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

/// Translate a vendor event stream. The session is finalized exactly once, also
/// when a line fails part way, so consumers always see `response.completed`.
fn run_stream(input: &str, config: &BridgeConfig, out: &mut impl Write) -> Result<(), CliError> {
    let started = Instant::now();
    let pool = StreamStatePool::new(config.stream.pool_max_idle);
    let mut session = ConverseStreamSession::new(&pool, config.stream.model.clone());
    let mut output_tokens = 0;

    let pumped = pump_vendor_lines(input, &mut session, &mut output_tokens, out);

    let reported = session.usage();
    let completion = session.finish(None);
    let written = completion
        .iter()
        .try_for_each(|event| write_json_line(out, event));
    let usage = merge_usage(reported.as_ref(), 0, output_tokens);
    log_stream_complete(
        config.stream.model.as_deref().unwrap_or("unknown"),
        &usage,
        started,
    );
    pumped.and(written)
}

fn pump_vendor_lines(
    input: &str,
    session: &mut ConverseStreamSession<'_>,
    output_tokens: &mut u64,
    out: &mut impl Write,
) -> Result<(), CliError> {
    for (line_number, line) in json_lines(input) {
        let Some(event) = parse_vendor_line(line_number, line)? else {
            continue;
        };
        let events = session.push(&event);
        *output_tokens += estimate_stream_output_tokens(&events);
        for event in &events {
            write_json_line(out, event)?;
        }
    }
    Ok(())
}

fn run_reverse(input: &str, out: &mut impl Write) -> Result<(), CliError> {
    for (line_number, line) in json_lines(input) {
        let event: ResponsesStreamEvent =
            serde_json::from_str(line).map_err(|e| CliError::Line {
                line: line_number,
                message: e.to_string(),
            })?;
        for converse_event in translate_responses_event(&event) {
            let (name, payload) = converse_event.to_named()?;
            write_json_line(out, &json!({"event": name, "data": payload}))?;
        }
    }
    Ok(())
}

fn run_to_responses(
    input: &str,
    config: &BridgeConfig,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let conversation: ConverseConversation = serde_json::from_str(input)?;
    let options = ConvertOptions::from_config(&config.conversion);
    let items = convert_converse_to_responses(&conversation, &options)?;
    tracing::debug!(items = items.len(), "converted conversation to items");
    serde_json::to_writer_pretty(&mut *out, &items)?;
    out.write_all(b"\n")?;
    Ok(())
}

fn run_to_converse(input: &str, out: &mut impl Write) -> Result<(), CliError> {
    let items: Vec<ResponsesItem> = serde_json::from_str(input)?;
    let conversation = convert_responses_to_converse(&items)?;
    tracing::debug!(
        turns = conversation.messages.len(),
        estimated_input_tokens = estimate_conversation_tokens(&conversation),
        "converted items to conversation"
    );
    serde_json::to_writer_pretty(&mut *out, &conversation)?;
    out.write_all(b"\n")?;
    Ok(())
}
