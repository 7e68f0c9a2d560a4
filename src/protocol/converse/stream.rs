use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ConverseMetrics, ConverseRole, TokenUsage};

/// One decoded `ConverseStream` event.
///
/// Serializes in the envelope form `{"<eventName>": {...payload}}`, which is how
/// the event-stream frame's `:event-type` header pairs with its JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConverseStreamEvent {
    MessageStart(MessageStartEvent),
    ContentBlockStart(ContentBlockStartEvent),
    ContentBlockDelta(ContentBlockDeltaEvent),
    ContentBlockStop(ContentBlockStopEvent),
    MessageStop(MessageStopEvent),
    Metadata(MetadataEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageStartEvent {
    pub role: ConverseRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlockStartEvent {
    pub content_block_index: usize,
    pub start: ContentBlockStart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentBlockStart {
    ToolUse(ToolUseBlockStart),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseBlockStart {
    pub tool_use_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlockDeltaEvent {
    pub content_block_index: usize,
    pub delta: ContentBlockDelta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentBlockDelta {
    Text(String),
    ToolUse(ToolUseBlockDelta),
    ReasoningContent(ReasoningContentDelta),
}

/// A fragment of tool input JSON. Not valid JSON until all fragments are joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUseBlockDelta {
    pub input: String,
}

/// Reasoning delta: text and signature never arrive in the same event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReasoningContentDelta {
    Text(String),
    Signature(String),
    RedactedContent(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentBlockStopEvent {
    pub content_block_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStopEvent {
    pub stop_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_model_response_fields: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetadataEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<ConverseMetrics>,
}

impl ConverseStreamEvent {
    /// The event-stream `:event-type` name of this event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            ConverseStreamEvent::MessageStart(_) => "messageStart",
            ConverseStreamEvent::ContentBlockStart(_) => "contentBlockStart",
            ConverseStreamEvent::ContentBlockDelta(_) => "contentBlockDelta",
            ConverseStreamEvent::ContentBlockStop(_) => "contentBlockStop",
            ConverseStreamEvent::MessageStop(_) => "messageStop",
            ConverseStreamEvent::Metadata(_) => "metadata",
        }
    }

    /// Parse a named event payload, i.e. a decoded event-stream frame.
    ///
    /// Unknown event names and malformed payloads yield `None`.
    #[must_use]
    pub fn from_named(event_type: &str, payload: &[u8]) -> Option<Self> {
        let event = match event_type {
            "messageStart" => ConverseStreamEvent::MessageStart(serde_json::from_slice(payload).ok()?),
            "contentBlockStart" => {
                ConverseStreamEvent::ContentBlockStart(serde_json::from_slice(payload).ok()?)
            }
            "contentBlockDelta" => {
                ConverseStreamEvent::ContentBlockDelta(serde_json::from_slice(payload).ok()?)
            }
            "contentBlockStop" => {
                ConverseStreamEvent::ContentBlockStop(serde_json::from_slice(payload).ok()?)
            }
            "messageStop" => ConverseStreamEvent::MessageStop(serde_json::from_slice(payload).ok()?),
            "metadata" => ConverseStreamEvent::Metadata(serde_json::from_slice(payload).ok()?),
            _ => return None,
        };
        Some(event)
    }

    /// Split into the `(event name, payload)` pair written to an event-stream frame.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the payload cannot be encoded as JSON.
    pub fn to_named(&self) -> serde_json::Result<(&'static str, Value)> {
        let payload = match self {
            ConverseStreamEvent::MessageStart(event) => serde_json::to_value(event)?,
            ConverseStreamEvent::ContentBlockStart(event) => serde_json::to_value(event)?,
            ConverseStreamEvent::ContentBlockDelta(event) => serde_json::to_value(event)?,
            ConverseStreamEvent::ContentBlockStop(event) => serde_json::to_value(event)?,
            ConverseStreamEvent::MessageStop(event) => serde_json::to_value(event)?,
            ConverseStreamEvent::Metadata(event) => serde_json::to_value(event)?,
        };
        Ok((self.event_type(), payload))
    }

    /// Content block index addressed by this event, if any.
    #[must_use]
    pub fn content_block_index(&self) -> Option<usize> {
        match self {
            ConverseStreamEvent::ContentBlockStart(event) => Some(event.content_block_index),
            ConverseStreamEvent::ContentBlockDelta(event) => Some(event.content_block_index),
            ConverseStreamEvent::ContentBlockStop(event) => Some(event.content_block_index),
            ConverseStreamEvent::MessageStart(_)
            | ConverseStreamEvent::MessageStop(_)
            | ConverseStreamEvent::Metadata(_) => None,
        }
    }
}
