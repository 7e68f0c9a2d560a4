use crate::protocol::mapping::{finish_to_incomplete_reason, FinishReason};
use crate::protocol::responses::{
    ContentPart, FunctionCallItem, IncompleteDetails, ItemStatus, MessageContent, MessageItem,
    ReasoningItem, ResponseStatus, ResponsesItem, ResponsesResponse, ResponsesRole,
    ResponsesStreamEvent, ResponsesUsage, StreamEventKind,
};

use super::state::{SlotKind, StreamState};

/// Appends events to a buffer, numbering them from a base sequence number.
pub(crate) struct EventSink<'a> {
    next_sequence: u64,
    out: &'a mut Vec<ResponsesStreamEvent>,
}

impl<'a> EventSink<'a> {
    pub(crate) fn new(sequence_number: u64, out: &'a mut Vec<ResponsesStreamEvent>) -> Self {
        Self {
            next_sequence: sequence_number,
            out,
        }
    }

    pub(crate) fn emit(&mut self, kind: StreamEventKind) {
        self.out
            .push(ResponsesStreamEvent::new(self.next_sequence, kind));
        self.next_sequence += 1;
    }
}

/// Close every open item and emit `response.completed`.
///
/// Tool and text items close first, then reasoning items, each in output order.
/// The stop reason is the one recorded from `messageStop`, or `tool_calls` when
/// the stream opened a tool call and `stop` otherwise.
#[must_use]
pub fn finalize_stream(
    state: &mut StreamState,
    sequence_number: u64,
    usage: Option<ResponsesUsage>,
) -> Vec<ResponsesStreamEvent> {
    let mut out = Vec::with_capacity(state.slots().len() * 3 + 1);
    finalize_stream_into(state, sequence_number, usage, &mut out);
    out
}

/// Finalize into a caller-provided buffer. The buffer is cleared first.
pub fn finalize_stream_into(
    state: &mut StreamState,
    sequence_number: u64,
    usage: Option<ResponsesUsage>,
    out: &mut Vec<ResponsesStreamEvent>,
) {
    out.clear();
    // A stream cut short before `messageStart` still gets an id and timestamp.
    state.ensure_message_id();
    let mut sink = EventSink::new(sequence_number, out);

    for output_index in 0..state.slots().len() {
        if state.slot(output_index).is_some_and(|slot| !slot.is_reasoning()) {
            close_slot(state, output_index, &mut sink);
        }
    }
    for output_index in 0..state.slots().len() {
        close_slot(state, output_index, &mut sink);
    }

    let finish = state.stop_reason().unwrap_or(if state.has_tool_calls() {
        FinishReason::ToolCalls
    } else {
        FinishReason::Stop
    });
    let incomplete = finish_to_incomplete_reason(finish);

    let mut response = ResponsesResponse::new(
        state.message_id().unwrap_or_default(),
        state.created_at(),
        if incomplete.is_some() {
            ResponseStatus::Incomplete
        } else {
            ResponseStatus::Completed
        },
    );
    response.model = state.model().map(str::to_string);
    response.usage = usage;
    response.stop_reason = Some(finish.as_str().to_string());
    response.incomplete_details = incomplete.map(|reason| IncompleteDetails {
        reason: reason.to_string(),
    });
    sink.emit(StreamEventKind::Completed {
        response: Box::new(response),
    });
}

/// Close one output item, emitting its done events. A closed slot stays silent.
pub(crate) fn close_slot(state: &mut StreamState, output_index: usize, sink: &mut EventSink<'_>) {
    if !state.complete(output_index) {
        return;
    }
    let Some(slot) = state.slot(output_index) else {
        return;
    };
    let content_index = slot.content_index;
    let item_id = slot.item_id.clone();

    match &slot.kind {
        SlotKind::Text => {
            sink.emit(StreamEventKind::OutputTextDone {
                output_index,
                content_index,
                item_id: item_id.clone(),
                text: String::new(),
            });
            sink.emit(StreamEventKind::ContentPartDone {
                output_index,
                content_index,
                item_id: item_id.clone(),
                part: ContentPart::output_text(""),
            });
            sink.emit(StreamEventKind::OutputItemDone {
                output_index,
                content_index: Some(content_index),
                item: ResponsesItem::Message(MessageItem {
                    id: Some(item_id),
                    role: ResponsesRole::Assistant,
                    status: Some(ItemStatus::Completed),
                    content: MessageContent::Parts(Vec::new()),
                }),
            });
        }
        SlotKind::Tool {
            call_id,
            name,
            arguments,
        } => {
            sink.emit(StreamEventKind::ContentPartDone {
                output_index,
                content_index,
                item_id: item_id.clone(),
                part: ContentPart::output_text(""),
            });
            if !arguments.is_empty() {
                sink.emit(StreamEventKind::FunctionCallArgumentsDone {
                    output_index,
                    item_id: item_id.clone(),
                    arguments: arguments.clone(),
                });
            }
            sink.emit(StreamEventKind::OutputItemDone {
                output_index,
                content_index: Some(content_index),
                item: ResponsesItem::FunctionCall(FunctionCallItem {
                    id: Some(item_id),
                    call_id: Some(call_id.clone()),
                    name: name.clone(),
                    arguments: arguments.clone(),
                    status: Some(ItemStatus::Completed),
                }),
            });
        }
        SlotKind::Reasoning => {
            sink.emit(StreamEventKind::ReasoningSummaryTextDone {
                output_index,
                content_index,
                item_id: item_id.clone(),
                text: String::new(),
            });
            sink.emit(StreamEventKind::ContentPartDone {
                output_index,
                content_index,
                item_id: item_id.clone(),
                part: ContentPart::reasoning_text("", None),
            });
            sink.emit(StreamEventKind::OutputItemDone {
                output_index,
                content_index: Some(content_index),
                item: ResponsesItem::Reasoning(ReasoningItem {
                    id: Some(item_id),
                    summary: Vec::new(),
                    content: Vec::new(),
                    encrypted_content: None,
                    status: Some(ItemStatus::Completed),
                }),
            });
        }
    }
}
