use smallvec::{smallvec, SmallVec};

use crate::protocol::converse::{
    ContentBlockDelta, ContentBlockDeltaEvent, ContentBlockStart, ContentBlockStartEvent,
    ConverseRole, ConverseStreamEvent, MessageStartEvent, MessageStopEvent, MetadataEvent,
    ReasoningContentDelta, ToolUseBlockDelta, ToolUseBlockStart,
};
use crate::protocol::mapping::{
    incomplete_reason_to_converse_stop, responses_usage_to_converse, unified_stop_to_converse,
};
use crate::protocol::responses::{
    ResponsesItem, ResponsesResponse, ResponsesStreamEvent, StreamEventKind,
};

/// Converse events produced by one unified event. Empty means nothing to send.
pub type ConverseEvents = SmallVec<[ConverseStreamEvent; 2]>;

/// Translate one Responses stream event back into Converse stream events.
///
/// Stateless: block indices are taken from the event itself. `response.completed`
/// yields `messageStop` followed by `metadata` when the response carries usage.
#[must_use]
pub fn translate_responses_event(event: &ResponsesStreamEvent) -> ConverseEvents {
    match &event.kind {
        StreamEventKind::Created { .. } => {
            smallvec![ConverseStreamEvent::MessageStart(MessageStartEvent {
                role: ConverseRole::Assistant,
            })]
        }
        StreamEventKind::OutputItemAdded {
            output_index,
            content_index,
            item: ResponsesItem::FunctionCall(call),
        } => {
            let Some(call_id) = call.call_id.as_deref().filter(|id| !id.is_empty()) else {
                tracing::debug!(output_index, "function call item without call id");
                return SmallVec::new();
            };
            smallvec![ConverseStreamEvent::ContentBlockStart(ContentBlockStartEvent {
                content_block_index: content_index.unwrap_or(*output_index),
                start: ContentBlockStart::ToolUse(ToolUseBlockStart {
                    tool_use_id: call_id.to_string(),
                    name: call.name.clone(),
                }),
            })]
        }
        StreamEventKind::OutputTextDelta {
            content_index,
            delta,
            ..
        } if !delta.is_empty() => block_delta(*content_index, ContentBlockDelta::Text(delta.clone())),
        StreamEventKind::FunctionCallArgumentsDelta {
            output_index,
            content_index,
            delta,
            ..
        } => block_delta(
            content_index.unwrap_or(*output_index),
            ContentBlockDelta::ToolUse(ToolUseBlockDelta {
                input: delta.clone(),
            }),
        ),
        StreamEventKind::ReasoningSummaryTextDelta {
            content_index,
            delta,
            signature,
            ..
        } => match signature {
            Some(signature) => block_delta(
                *content_index,
                ContentBlockDelta::ReasoningContent(ReasoningContentDelta::Signature(
                    signature.clone(),
                )),
            ),
            None if !delta.is_empty() => block_delta(
                *content_index,
                ContentBlockDelta::ReasoningContent(ReasoningContentDelta::Text(delta.clone())),
            ),
            None => SmallVec::new(),
        },
        StreamEventKind::Completed { response } => completed_to_converse(response),
        StreamEventKind::InProgress { .. }
        | StreamEventKind::OutputItemAdded { .. }
        | StreamEventKind::OutputItemDone { .. }
        | StreamEventKind::ContentPartAdded { .. }
        | StreamEventKind::ContentPartDone { .. }
        | StreamEventKind::OutputTextDelta { .. }
        | StreamEventKind::OutputTextDone { .. }
        | StreamEventKind::FunctionCallArgumentsDone { .. }
        | StreamEventKind::ReasoningSummaryTextDone { .. }
        | StreamEventKind::Error { .. } => SmallVec::new(),
    }
}

fn block_delta(content_block_index: usize, delta: ContentBlockDelta) -> ConverseEvents {
    smallvec![ConverseStreamEvent::ContentBlockDelta(ContentBlockDeltaEvent {
        content_block_index,
        delta,
    })]
}

fn completed_to_converse(response: &ResponsesResponse) -> ConverseEvents {
    let stop_reason = match (&response.incomplete_details, &response.stop_reason) {
        (Some(details), _) => incomplete_reason_to_converse_stop(&details.reason),
        (None, Some(reason)) => unified_stop_to_converse(reason),
        (None, None) => "end_turn",
    };
    let mut events: ConverseEvents = smallvec![ConverseStreamEvent::MessageStop(MessageStopEvent {
        stop_reason: stop_reason.to_string(),
        additional_model_response_fields: None,
    })];
    if let Some(usage) = &response.usage {
        events.push(ConverseStreamEvent::Metadata(MetadataEvent {
            usage: Some(responses_usage_to_converse(usage)),
            metrics: None,
        }));
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::responses::{
        FunctionCallItem, IncompleteDetails, ItemStatus, ResponseStatus, ResponsesUsage,
    };

    fn wrap(kind: StreamEventKind) -> ResponsesStreamEvent {
        ResponsesStreamEvent::new(0, kind)
    }

    #[test]
    fn test_created_becomes_message_start() {
        let response = ResponsesResponse::new("msg_1", 0, ResponseStatus::InProgress);
        let events = translate_responses_event(&wrap(StreamEventKind::Created {
            response: Box::new(response.clone()),
        }));
        assert_eq!(
            events.as_slice(),
            &[ConverseStreamEvent::MessageStart(MessageStartEvent {
                role: ConverseRole::Assistant
            })]
        );
        assert!(translate_responses_event(&wrap(StreamEventKind::InProgress {
            response: Box::new(response)
        }))
        .is_empty());
    }

    #[test]
    fn test_function_call_added_uses_content_index() {
        let item = ResponsesItem::FunctionCall(FunctionCallItem {
            id: Some("t1".into()),
            call_id: Some("t1".into()),
            name: "get_weather".into(),
            arguments: String::new(),
            status: Some(ItemStatus::InProgress),
        });
        let events = translate_responses_event(&wrap(StreamEventKind::OutputItemAdded {
            output_index: 1,
            content_index: Some(3),
            item: item.clone(),
        }));
        assert_eq!(events[0].content_block_index(), Some(3));

        let events = translate_responses_event(&wrap(StreamEventKind::OutputItemAdded {
            output_index: 1,
            content_index: None,
            item,
        }));
        assert_eq!(events[0].content_block_index(), Some(1));
    }

    #[test]
    fn test_empty_text_delta_is_dropped() {
        let event = wrap(StreamEventKind::OutputTextDelta {
            output_index: 0,
            content_index: 0,
            item_id: "i".into(),
            delta: String::new(),
        });
        assert!(translate_responses_event(&event).is_empty());
    }

    #[test]
    fn test_reasoning_signature_wins_over_text() {
        let event = wrap(StreamEventKind::ReasoningSummaryTextDelta {
            output_index: 0,
            content_index: 0,
            item_id: "r".into(),
            delta: String::new(),
            signature: Some("sig".into()),
        });
        let events = translate_responses_event(&event);
        assert_eq!(
            events.as_slice(),
            &[ConverseStreamEvent::ContentBlockDelta(ContentBlockDeltaEvent {
                content_block_index: 0,
                delta: ContentBlockDelta::ReasoningContent(ReasoningContentDelta::Signature(
                    "sig".into()
                )),
            })]
        );
    }

    #[test]
    fn test_completed_yields_stop_and_metadata() {
        let mut response = ResponsesResponse::new("msg_1", 0, ResponseStatus::Completed);
        response.stop_reason = Some("tool_calls".into());
        response.usage = Some(ResponsesUsage {
            input_tokens: 5,
            output_tokens: 5,
            total_tokens: 10,
            input_tokens_details: None,
        });
        let events = translate_responses_event(&wrap(StreamEventKind::Completed {
            response: Box::new(response),
        }));
        assert_eq!(events.len(), 2);
        match &events[0] {
            ConverseStreamEvent::MessageStop(stop) => assert_eq!(stop.stop_reason, "tool_use"),
            other => panic!("Expected MessageStop, got {other:?}"),
        }
        match &events[1] {
            ConverseStreamEvent::Metadata(metadata) => {
                assert_eq!(metadata.usage.map(|usage| usage.total_tokens), Some(10));
            }
            other => panic!("Expected Metadata, got {other:?}"),
        }
    }

    #[test]
    fn test_incomplete_maps_to_max_tokens() {
        let mut response = ResponsesResponse::new("msg_1", 0, ResponseStatus::Incomplete);
        response.stop_reason = Some("length".into());
        response.incomplete_details = Some(IncompleteDetails {
            reason: "max_output_tokens".into(),
        });
        let events = translate_responses_event(&wrap(StreamEventKind::Completed {
            response: Box::new(response),
        }));
        assert_eq!(events.len(), 1);
        match &events[0] {
            ConverseStreamEvent::MessageStop(stop) => assert_eq!(stop.stop_reason, "max_tokens"),
            other => panic!("Expected MessageStop, got {other:?}"),
        }
    }

    #[test]
    fn test_done_events_and_errors_produce_nothing() {
        let done = wrap(StreamEventKind::OutputTextDone {
            output_index: 0,
            content_index: 0,
            item_id: "i".into(),
            text: String::new(),
        });
        assert!(translate_responses_event(&done).is_empty());
        let error = wrap(StreamEventKind::Error {
            message: "boom".into(),
            code: None,
        });
        assert!(translate_responses_event(&error).is_empty());
    }
}
