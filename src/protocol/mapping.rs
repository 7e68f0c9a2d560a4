use super::converse::{ConverseRole, DocumentFormat, ImageFormat, TokenUsage};
use super::responses::{InputTokensDetails, ResponsesRole, ResponsesUsage};
use crate::util::file_extension;

/// Normalized stop vocabulary used in unified responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    ContentFilter,
}

impl FinishReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content_filter",
        }
    }

    /// Parse a unified stop reason string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stop" => Some(FinishReason::Stop),
            "tool_calls" => Some(FinishReason::ToolCalls),
            "length" => Some(FinishReason::Length),
            "content_filter" => Some(FinishReason::ContentFilter),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Role mappings
// ---------------------------------------------------------------------------

#[must_use]
pub fn converse_role_to_responses(role: ConverseRole) -> ResponsesRole {
    match role {
        ConverseRole::User => ResponsesRole::User,
        ConverseRole::Assistant => ResponsesRole::Assistant,
    }
}

/// Map a unified role onto a Converse turn role. System roles have no turn role.
#[must_use]
pub fn responses_role_to_converse(role: ResponsesRole) -> Option<ConverseRole> {
    match role {
        ResponsesRole::User => Some(ConverseRole::User),
        ResponsesRole::Assistant => Some(ConverseRole::Assistant),
        ResponsesRole::System | ResponsesRole::Developer => None,
    }
}

// ---------------------------------------------------------------------------
// Stop reason mappings
// ---------------------------------------------------------------------------

#[must_use]
pub fn converse_stop_to_finish(s: &str) -> FinishReason {
    match s {
        "tool_use" => FinishReason::ToolCalls,
        "end_turn" | "stop_sequence" => FinishReason::Stop,
        "max_tokens" | "model_context_window_exceeded" => FinishReason::Length,
        "guardrail_intervened" | "content_filtered" => FinishReason::ContentFilter,
        other => {
            tracing::warn!(stop_reason = other, "unknown converse stop reason, treating as stop");
            FinishReason::Stop
        }
    }
}

#[must_use]
pub fn finish_to_converse_stop(reason: FinishReason) -> &'static str {
    match reason {
        FinishReason::Stop => "end_turn",
        FinishReason::ToolCalls => "tool_use",
        FinishReason::Length => "max_tokens",
        FinishReason::ContentFilter => "content_filtered",
    }
}

/// Map a unified stop string back to a Converse stop reason.
///
/// Vendor-native reasons pass through unchanged; unknown strings become `end_turn`.
#[must_use]
pub fn unified_stop_to_converse(s: &str) -> &'static str {
    if let Some(reason) = FinishReason::parse(s) {
        return finish_to_converse_stop(reason);
    }
    match s {
        "tool_use" => "tool_use",
        "max_tokens" => "max_tokens",
        "stop_sequence" => "stop_sequence",
        "guardrail_intervened" => "guardrail_intervened",
        "content_filtered" => "content_filtered",
        _ => "end_turn",
    }
}

/// The `incomplete_details.reason` reported for an unfinished response.
#[must_use]
pub fn finish_to_incomplete_reason(reason: FinishReason) -> Option<&'static str> {
    match reason {
        FinishReason::Length => Some("max_output_tokens"),
        FinishReason::ContentFilter => Some("content_filter"),
        FinishReason::Stop | FinishReason::ToolCalls => None,
    }
}

#[must_use]
pub fn incomplete_reason_to_converse_stop(reason: &str) -> &'static str {
    match reason {
        "max_output_tokens" | "max_tokens" | "length" => "max_tokens",
        "content_filter" | "content_filtered" => "content_filtered",
        other => unified_stop_to_converse(other),
    }
}

// ---------------------------------------------------------------------------
// Usage mappings
// ---------------------------------------------------------------------------

#[must_use]
pub fn converse_usage_to_responses(usage: &TokenUsage) -> ResponsesUsage {
    let has_cache = usage.cache_read_input_tokens.is_some() || usage.cache_write_input_tokens.is_some();
    let total = if usage.total_tokens > 0 {
        usage.total_tokens
    } else {
        usage.input_tokens + usage.output_tokens
    };
    ResponsesUsage {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        total_tokens: total,
        input_tokens_details: has_cache.then(|| InputTokensDetails {
            cached_tokens: usage.cache_read_input_tokens.unwrap_or(0),
            cache_write_tokens: usage.cache_write_input_tokens,
        }),
    }
}

#[must_use]
pub fn responses_usage_to_converse(usage: &ResponsesUsage) -> TokenUsage {
    let details = usage.input_tokens_details.unwrap_or_default();
    TokenUsage {
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
        total_tokens: usage.total_tokens,
        cache_read_input_tokens: (details.cached_tokens > 0).then_some(details.cached_tokens),
        cache_write_input_tokens: details.cache_write_tokens,
    }
}

// ---------------------------------------------------------------------------
// Media mappings
// ---------------------------------------------------------------------------

/// Image format from a media type; anything unrecognized is treated as JPEG.
#[must_use]
pub fn image_format_from_media_type(media_type: &str) -> ImageFormat {
    match media_type.to_ascii_lowercase().as_str() {
        "image/png" => ImageFormat::Png,
        "image/gif" => ImageFormat::Gif,
        "image/webp" => ImageFormat::Webp,
        _ => ImageFormat::Jpeg,
    }
}

/// Document format for a unified file part.
///
/// Text media types and txt/md/html file names map to `txt`; everything else is `pdf`.
#[must_use]
pub fn document_format_for(file_type: Option<&str>, filename: Option<&str>) -> DocumentFormat {
    if file_type.is_some_and(|t| t.to_ascii_lowercase().starts_with("text/")) {
        return DocumentFormat::Txt;
    }
    match filename.and_then(file_extension).as_deref() {
        Some("txt" | "md" | "html") => DocumentFormat::Txt,
        _ => DocumentFormat::Pdf,
    }
}

/// Media type reported for a Converse document format.
#[must_use]
pub fn document_format_to_file_type(format: DocumentFormat) -> &'static str {
    if format.is_text() {
        "text/plain"
    } else {
        "application/pdf"
    }
}
