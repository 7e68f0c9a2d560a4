use crate::protocol::converse::{
    ContentBlockDelta, ContentBlockStart, ConverseStreamEvent, ReasoningContentDelta,
    ToolUseBlockStart,
};
use crate::protocol::mapping::converse_stop_to_finish;
use crate::protocol::responses::{
    ContentPart, FunctionCallItem, ItemStatus, MessageContent, MessageItem, ReasoningItem,
    ResponseStatus, ResponsesItem, ResponsesResponse, ResponsesRole, ResponsesStreamEvent,
    StreamEventKind,
};

use super::finalize::{close_slot, EventSink};
use super::state::{OutputSlot, SlotKind, StreamState};

/// Translate one Converse stream event into zero or more Responses stream events.
///
/// Emitted events are numbered from `sequence_number` upward; the caller advances
/// its counter by the number of events returned.
#[must_use]
pub fn translate_converse_event(
    event: &ConverseStreamEvent,
    sequence_number: u64,
    state: &mut StreamState,
) -> Vec<ResponsesStreamEvent> {
    let mut out = Vec::with_capacity(3);
    translate_converse_event_into(event, sequence_number, state, &mut out);
    out
}

/// Translate into a caller-provided buffer. The buffer is cleared first.
pub fn translate_converse_event_into(
    event: &ConverseStreamEvent,
    sequence_number: u64,
    state: &mut StreamState,
    out: &mut Vec<ResponsesStreamEvent>,
) {
    out.clear();
    let mut sink = EventSink::new(sequence_number, out);
    match event {
        ConverseStreamEvent::MessageStart(_) => on_message_start(state, &mut sink),
        ConverseStreamEvent::ContentBlockStart(start) => match &start.start {
            ContentBlockStart::ToolUse(tool) => {
                on_tool_start(state, start.content_block_index, tool, &mut sink);
            }
        },
        ConverseStreamEvent::ContentBlockDelta(delta) => {
            let content_index = delta.content_block_index;
            match &delta.delta {
                ContentBlockDelta::Text(text) => {
                    on_text_delta(state, content_index, text, &mut sink);
                }
                ContentBlockDelta::ToolUse(tool) => {
                    on_tool_delta(state, content_index, &tool.input, &mut sink);
                }
                ContentBlockDelta::ReasoningContent(reasoning) => {
                    on_reasoning_delta(state, content_index, reasoning, &mut sink);
                }
            }
        }
        ConverseStreamEvent::MessageStop(stop) => {
            state.set_stop_reason(converse_stop_to_finish(&stop.stop_reason));
        }
        // Block ends are implied by the next block or by finalization; usage is
        // picked up by the session.
        ConverseStreamEvent::ContentBlockStop(_) | ConverseStreamEvent::Metadata(_) => {}
    }
}

fn on_message_start(state: &mut StreamState, sink: &mut EventSink<'_>) {
    state.ensure_message_id();
    if !state.created_emitted {
        state.created_emitted = true;
        sink.emit(StreamEventKind::Created {
            response: Box::new(in_progress_response(state)),
        });
    }
    if !state.in_progress_emitted {
        state.in_progress_emitted = true;
        sink.emit(StreamEventKind::InProgress {
            response: Box::new(in_progress_response(state)),
        });
    }
}

fn in_progress_response(state: &StreamState) -> ResponsesResponse {
    let mut response = ResponsesResponse::new(
        state.message_id().unwrap_or_default(),
        state.created_at(),
        ResponseStatus::InProgress,
    );
    response.model = state.model().map(str::to_string);
    response
}

fn on_tool_start(
    state: &mut StreamState,
    content_index: usize,
    tool: &ToolUseBlockStart,
    sink: &mut EventSink<'_>,
) {
    if state.output_index_for(content_index).is_some() {
        tracing::debug!(content_index, "ignoring repeated tool start for a known block");
        return;
    }

    close_reasoning_below(state, usize::MAX, sink);
    close_open_slots(state, sink, |slot| matches!(slot.kind, SlotKind::Text));
    close_open_slots(state, sink, OutputSlot::is_tool);

    let output_index = state.allocate(
        content_index,
        tool.tool_use_id.clone(),
        SlotKind::Tool {
            call_id: tool.tool_use_id.clone(),
            name: tool.name.clone(),
            arguments: String::new(),
        },
    );
    sink.emit(StreamEventKind::OutputItemAdded {
        output_index,
        content_index: Some(content_index),
        item: ResponsesItem::FunctionCall(FunctionCallItem {
            id: Some(tool.tool_use_id.clone()),
            call_id: Some(tool.tool_use_id.clone()),
            name: tool.name.clone(),
            arguments: String::new(),
            status: Some(ItemStatus::InProgress),
        }),
    });
}

fn on_text_delta(
    state: &mut StreamState,
    content_index: usize,
    text: &str,
    sink: &mut EventSink<'_>,
) {
    if let Some(output_index) = state.output_index_for(content_index) {
        let Some(item_id) = open_slot_id(state, output_index, |kind| matches!(kind, SlotKind::Text))
        else {
            tracing::debug!(content_index, "skipping text delta for a non-text block");
            return;
        };
        if !text.is_empty() {
            sink.emit(StreamEventKind::OutputTextDelta {
                output_index,
                content_index,
                item_id,
                delta: text.to_string(),
            });
        }
        return;
    }

    close_reasoning_below(state, content_index, sink);

    let item_id = state.synthesize_item_id("item", state.next_output_index());
    let output_index = state.allocate(content_index, item_id.clone(), SlotKind::Text);
    sink.emit(StreamEventKind::OutputItemAdded {
        output_index,
        content_index: Some(content_index),
        item: ResponsesItem::Message(MessageItem {
            id: Some(item_id.clone()),
            role: ResponsesRole::Assistant,
            status: Some(ItemStatus::InProgress),
            content: MessageContent::Parts(Vec::new()),
        }),
    });
    sink.emit(StreamEventKind::ContentPartAdded {
        output_index,
        content_index,
        item_id: item_id.clone(),
        part: ContentPart::output_text(""),
    });
    if !text.is_empty() {
        sink.emit(StreamEventKind::OutputTextDelta {
            output_index,
            content_index,
            item_id,
            delta: text.to_string(),
        });
    }
}

fn on_tool_delta(
    state: &mut StreamState,
    content_index: usize,
    fragment: &str,
    sink: &mut EventSink<'_>,
) {
    if fragment.is_empty() {
        return;
    }
    let Some(output_index) = state.output_index_for(content_index) else {
        tracing::debug!(content_index, "skipping tool input delta for an unknown block");
        return;
    };
    let Some(slot) = state.slot_mut(output_index).filter(|slot| !slot.completed) else {
        return;
    };
    let SlotKind::Tool { arguments, .. } = &mut slot.kind else {
        tracing::debug!(content_index, "skipping tool input delta for a non-tool block");
        return;
    };
    arguments.push_str(fragment);
    sink.emit(StreamEventKind::FunctionCallArgumentsDelta {
        output_index,
        content_index: Some(content_index),
        item_id: slot.item_id.clone(),
        delta: fragment.to_string(),
    });
}

fn on_reasoning_delta(
    state: &mut StreamState,
    content_index: usize,
    delta: &ReasoningContentDelta,
    sink: &mut EventSink<'_>,
) {
    let Some(output_index) = state.output_index_for(content_index) else {
        open_reasoning(state, content_index, delta, sink);
        return;
    };
    let Some(item_id) = open_slot_id(state, output_index, |kind| matches!(kind, SlotKind::Reasoning))
    else {
        tracing::debug!(content_index, "skipping reasoning delta for a non-reasoning block");
        return;
    };

    match delta {
        ReasoningContentDelta::Text(text) if !text.is_empty() => {
            sink.emit(StreamEventKind::ReasoningSummaryTextDelta {
                output_index,
                content_index,
                item_id,
                delta: text.clone(),
                signature: None,
            });
        }
        ReasoningContentDelta::Signature(signature) => {
            sink.emit(StreamEventKind::ReasoningSummaryTextDelta {
                output_index,
                content_index,
                item_id,
                delta: String::new(),
                signature: Some(signature.clone()),
            });
        }
        ReasoningContentDelta::Text(_) => {}
        ReasoningContentDelta::RedactedContent(_) => {
            tracing::debug!(content_index, "skipping redacted reasoning after block start");
        }
    }
}

fn open_reasoning(
    state: &mut StreamState,
    content_index: usize,
    delta: &ReasoningContentDelta,
    sink: &mut EventSink<'_>,
) {
    let (text, signature, opaque) = match delta {
        ReasoningContentDelta::Text(text) => (Some(text.as_str()), None, None),
        ReasoningContentDelta::Signature(signature) => (None, Some(signature.clone()), None),
        ReasoningContentDelta::RedactedContent(data) => (None, None, Some(data.clone())),
    };

    let item_id = state.synthesize_item_id("reasoning", state.next_output_index());
    let output_index = state.allocate(content_index, item_id.clone(), SlotKind::Reasoning);
    sink.emit(StreamEventKind::OutputItemAdded {
        output_index,
        content_index: Some(content_index),
        item: ResponsesItem::Reasoning(ReasoningItem {
            id: Some(item_id.clone()),
            summary: Vec::new(),
            content: Vec::new(),
            encrypted_content: signature.clone().or(opaque),
            status: Some(ItemStatus::InProgress),
        }),
    });
    sink.emit(StreamEventKind::ContentPartAdded {
        output_index,
        content_index,
        item_id: item_id.clone(),
        part: ContentPart::reasoning_text("", signature),
    });
    if let Some(text) = text.filter(|text| !text.is_empty()) {
        sink.emit(StreamEventKind::ReasoningSummaryTextDelta {
            output_index,
            content_index,
            item_id,
            delta: text.to_string(),
            signature: None,
        });
    }
}

/// Item id of the slot at `output_index` if it is still open and of the wanted kind.
fn open_slot_id(
    state: &StreamState,
    output_index: usize,
    wanted: impl Fn(&SlotKind) -> bool,
) -> Option<String> {
    state
        .slot(output_index)
        .filter(|slot| !slot.completed && wanted(&slot.kind))
        .map(|slot| slot.item_id.clone())
}

/// Close open reasoning blocks whose content index is below `limit`.
fn close_reasoning_below(state: &mut StreamState, limit: usize, sink: &mut EventSink<'_>) {
    for content_index in state.open_reasoning_indices() {
        if content_index >= limit {
            break;
        }
        if let Some(output_index) = state.output_index_for(content_index) {
            close_slot(state, output_index, sink);
        }
    }
}

fn close_open_slots(
    state: &mut StreamState,
    sink: &mut EventSink<'_>,
    select: impl Fn(&OutputSlot) -> bool,
) {
    for output_index in 0..state.slots().len() {
        if state
            .slot(output_index)
            .is_some_and(|slot| !slot.completed && select(slot))
        {
            close_slot(state, output_index, sink);
        }
    }
}
