use crate::protocol::converse::{
    ContentBlock, ConverseConversation, ReasoningBlock, SystemContentBlock, ToolResultContent,
};
use crate::protocol::responses::{ResponsesStreamEvent, ResponsesUsage, StreamEventKind};
use std::time::Duration;
use tracing::info;

/// Estimate the number of tokens in `text`.
///
/// Uses a lightweight heuristic (`bytes / 4`) to avoid loading model BPE tables.
#[must_use]
pub fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

/// Estimate the input tokens of a Converse conversation.
///
/// Counts system text, message text, reasoning text, tool input and textual
/// tool results. Images and documents are not counted.
#[must_use]
pub fn estimate_conversation_tokens(conversation: &ConverseConversation) -> u64 {
    let mut total: u64 = 0;

    for block in &conversation.system {
        if let SystemContentBlock::Text(text) = block {
            total += estimate_tokens(text);
        }
    }

    for message in &conversation.messages {
        for block in &message.content {
            match block {
                ContentBlock::Text(text) => total += estimate_tokens(text),
                ContentBlock::ReasoningContent(ReasoningBlock::ReasoningText(reasoning)) => {
                    total += estimate_tokens(&reasoning.text);
                }
                ContentBlock::ToolUse(tool_use) => {
                    total += estimate_tokens(&tool_use.name);
                    if let Ok(serialized) = serde_json::to_string(&tool_use.input) {
                        total += estimate_tokens(&serialized);
                    }
                }
                ContentBlock::ToolResult(result) => {
                    for content in &result.content {
                        match content {
                            ToolResultContent::Text(text) => total += estimate_tokens(text),
                            ToolResultContent::Json(value) => {
                                total += estimate_tokens(&value.to_string());
                            }
                            ToolResultContent::Image(_) | ToolResultContent::Document(_) => {}
                        }
                    }
                }
                ContentBlock::ReasoningContent(ReasoningBlock::RedactedContent(_))
                | ContentBlock::Image(_)
                | ContentBlock::Document(_)
                | ContentBlock::CachePoint(_) => {}
            }
        }
    }

    total
}

/// Estimate the output tokens carried by translated stream deltas.
#[must_use]
pub fn estimate_stream_output_tokens(events: &[ResponsesStreamEvent]) -> u64 {
    events
        .iter()
        .map(|event| match &event.kind {
            StreamEventKind::OutputTextDelta { delta, .. }
            | StreamEventKind::FunctionCallArgumentsDelta { delta, .. }
            | StreamEventKind::ReasoningSummaryTextDelta { delta, .. } => estimate_tokens(delta),
            _ => 0,
        })
        .sum()
}

/// Merge stream-reported usage with local estimates.
///
/// - Non-zero reported values always win
/// - Zero or missing fields are filled from the estimates
/// - Total is recomputed from input + output when it is zero
#[must_use]
pub fn merge_usage(
    reported: Option<&ResponsesUsage>,
    estimated_input: u64,
    estimated_output: u64,
) -> ResponsesUsage {
    let reported = reported.copied().unwrap_or_default();
    let input_tokens = if reported.input_tokens > 0 {
        reported.input_tokens
    } else {
        estimated_input
    };
    let output_tokens = if reported.output_tokens > 0 {
        reported.output_tokens
    } else {
        estimated_output
    };
    let total_tokens = if reported.total_tokens > 0 {
        reported.total_tokens
    } else {
        input_tokens + output_tokens
    };

    ResponsesUsage {
        input_tokens,
        output_tokens,
        total_tokens,
        input_tokens_details: reported.input_tokens_details,
    }
}

/// Log token usage for a completed stream at INFO level.
pub fn log_stream_usage(model: &str, usage: &ResponsesUsage, duration: Duration) {
    info!(
        model = model,
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        total_tokens = usage.total_tokens,
        cached_tokens = usage.input_tokens_details.map_or(0, |details| details.cached_tokens),
        duration_seconds = duration.as_secs_f64(),
        "stream completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::converse::{ConverseMessage, ConverseRole, ToolUseBlock};
    use serde_json::json;

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_estimate_conversation_tokens() {
        let conversation = ConverseConversation {
            system: vec![SystemContentBlock::Text("abcdefgh".into())],
            messages: vec![ConverseMessage::new(
                ConverseRole::Assistant,
                vec![
                    ContentBlock::Text("abcd".into()),
                    ContentBlock::ToolUse(ToolUseBlock {
                        tool_use_id: "t".into(),
                        name: "f".into(),
                        input: json!({}),
                    }),
                ],
            )],
        };
        // 2 (system) + 1 (text) + 1 (name) + 1 ("{}")
        assert_eq!(estimate_conversation_tokens(&conversation), 5);
    }

    #[test]
    fn test_estimate_stream_output_tokens() {
        let events = vec![
            ResponsesStreamEvent::new(
                0,
                StreamEventKind::OutputTextDelta {
                    output_index: 0,
                    content_index: 0,
                    item_id: "i".into(),
                    delta: "abcdefgh".into(),
                },
            ),
            ResponsesStreamEvent::new(
                1,
                StreamEventKind::OutputTextDone {
                    output_index: 0,
                    content_index: 0,
                    item_id: "i".into(),
                    text: "ignored text".into(),
                },
            ),
        ];
        assert_eq!(estimate_stream_output_tokens(&events), 2);
    }

    #[test]
    fn test_merge_usage_prefers_reported() {
        let reported = ResponsesUsage {
            input_tokens: 100,
            output_tokens: 50,
            total_tokens: 150,
            input_tokens_details: None,
        };
        let merged = merge_usage(Some(&reported), 999, 999);
        assert_eq!(merged, reported);
    }

    #[test]
    fn test_merge_usage_fills_missing() {
        let merged = merge_usage(None, 40, 20);
        assert_eq!(merged.input_tokens, 40);
        assert_eq!(merged.output_tokens, 20);
        assert_eq!(merged.total_tokens, 60);
    }

    #[test]
    fn test_merge_usage_partial() {
        let reported = ResponsesUsage {
            input_tokens: 100,
            ..ResponsesUsage::default()
        };
        let merged = merge_usage(Some(&reported), 50, 25);
        assert_eq!(merged.input_tokens, 100);
        assert_eq!(merged.output_tokens, 25);
        assert_eq!(merged.total_tokens, 125);
    }
}
