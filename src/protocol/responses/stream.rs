use serde::{Deserialize, Serialize};

use super::{ContentPart, ResponsesItem, ResponsesResponse};

/// One Responses streaming event with its per-stream sequence number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsesStreamEvent {
    #[serde(flatten)]
    pub kind: StreamEventKind,
    pub sequence_number: u64,
}

impl ResponsesStreamEvent {
    #[must_use]
    pub fn new(sequence_number: u64, kind: StreamEventKind) -> Self {
        Self {
            kind,
            sequence_number,
        }
    }

    #[must_use]
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }
}

/// Responses streaming event payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEventKind {
    #[serde(rename = "response.created")]
    Created { response: Box<ResponsesResponse> },
    #[serde(rename = "response.in_progress")]
    InProgress { response: Box<ResponsesResponse> },
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        output_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_index: Option<usize>,
        item: ResponsesItem,
    },
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        output_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_index: Option<usize>,
        item: ResponsesItem,
    },
    #[serde(rename = "response.content_part.added")]
    ContentPartAdded {
        output_index: usize,
        content_index: usize,
        item_id: String,
        part: ContentPart,
    },
    #[serde(rename = "response.content_part.done")]
    ContentPartDone {
        output_index: usize,
        content_index: usize,
        item_id: String,
        part: ContentPart,
    },
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        output_index: usize,
        content_index: usize,
        item_id: String,
        delta: String,
    },
    #[serde(rename = "response.output_text.done")]
    OutputTextDone {
        output_index: usize,
        content_index: usize,
        item_id: String,
        text: String,
    },
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        output_index: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content_index: Option<usize>,
        item_id: String,
        delta: String,
    },
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone {
        output_index: usize,
        item_id: String,
        arguments: String,
    },
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta {
        output_index: usize,
        content_index: usize,
        item_id: String,
        #[serde(default)]
        delta: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    #[serde(rename = "response.reasoning_summary_text.done")]
    ReasoningSummaryTextDone {
        output_index: usize,
        content_index: usize,
        item_id: String,
        text: String,
    },
    #[serde(rename = "response.completed")]
    Completed { response: Box<ResponsesResponse> },
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },
}

impl StreamEventKind {
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEventKind::Created { .. } => "response.created",
            StreamEventKind::InProgress { .. } => "response.in_progress",
            StreamEventKind::OutputItemAdded { .. } => "response.output_item.added",
            StreamEventKind::OutputItemDone { .. } => "response.output_item.done",
            StreamEventKind::ContentPartAdded { .. } => "response.content_part.added",
            StreamEventKind::ContentPartDone { .. } => "response.content_part.done",
            StreamEventKind::OutputTextDelta { .. } => "response.output_text.delta",
            StreamEventKind::OutputTextDone { .. } => "response.output_text.done",
            StreamEventKind::FunctionCallArgumentsDelta { .. } => {
                "response.function_call_arguments.delta"
            }
            StreamEventKind::FunctionCallArgumentsDone { .. } => {
                "response.function_call_arguments.done"
            }
            StreamEventKind::ReasoningSummaryTextDelta { .. } => {
                "response.reasoning_summary_text.delta"
            }
            StreamEventKind::ReasoningSummaryTextDone { .. } => {
                "response.reasoning_summary_text.done"
            }
            StreamEventKind::Completed { .. } => "response.completed",
            StreamEventKind::Error { .. } => "error",
        }
    }

    /// Whether this event closes an item, part, or text/argument stream.
    #[must_use]
    pub fn is_done_event(&self) -> bool {
        matches!(
            self,
            StreamEventKind::OutputItemDone { .. }
                | StreamEventKind::ContentPartDone { .. }
                | StreamEventKind::OutputTextDone { .. }
                | StreamEventKind::FunctionCallArgumentsDone { .. }
                | StreamEventKind::ReasoningSummaryTextDone { .. }
        )
    }
}
