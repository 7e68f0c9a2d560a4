use std::collections::HashMap;

use converse_bridge::protocol::converse::{ContentBlockDelta, ConverseStreamEvent};
use converse_bridge::protocol::responses::{
    ResponseStatus, ResponsesStreamEvent, ResponsesUsage, StreamEventKind,
};
use converse_bridge::stream::{
    finalize_stream, translate_converse_event, translate_responses_event, ConverseStreamSession,
    StreamState, StreamStatePool,
};
use serde_json::json;

fn vendor_events(value: serde_json::Value) -> Vec<ConverseStreamEvent> {
    serde_json::from_value(value).expect("vendor events parse")
}

/// Run vendor events through a fresh state, numbering events continuously.
fn translate_all(
    events: &[ConverseStreamEvent],
    usage: Option<ResponsesUsage>,
) -> Vec<ResponsesStreamEvent> {
    let mut state = StreamState::new(Some("test-model".to_string()));
    let mut out = Vec::new();
    for event in events {
        let next = out.len() as u64;
        out.extend(translate_converse_event(event, next, &mut state));
    }
    let next = out.len() as u64;
    out.extend(finalize_stream(&mut state, next, usage));
    out
}

fn usage(input: u64, output: u64) -> ResponsesUsage {
    ResponsesUsage {
        input_tokens: input,
        output_tokens: output,
        total_tokens: input + output,
        input_tokens_details: None,
    }
}

#[test]
fn test_tool_call_stream_event_order() {
    let events = translate_all(
        &vendor_events(json!([
            {"messageStart": {"role": "assistant"}},
            {"contentBlockStart": {"contentBlockIndex": 0, "start": {"toolUse": {"toolUseId": "t1", "name": "get_weather"}}}},
            {"contentBlockDelta": {"contentBlockIndex": 0, "delta": {"toolUse": {"input": "{\"loc"}}}},
            {"contentBlockDelta": {"contentBlockIndex": 0, "delta": {"toolUse": {"input": "\":\"NYC\"}"}}}}
        ])),
        Some(usage(5, 5)),
    );

    let types: Vec<&str> = events.iter().map(ResponsesStreamEvent::event_type).collect();
    assert_eq!(
        types,
        vec![
            "response.created",
            "response.in_progress",
            "response.output_item.added",
            "response.function_call_arguments.delta",
            "response.function_call_arguments.delta",
            "response.content_part.done",
            "response.function_call_arguments.done",
            "response.output_item.done",
            "response.completed",
        ]
    );

    match &events[2].kind {
        StreamEventKind::OutputItemAdded { output_index, .. } => assert_eq!(*output_index, 0),
        other => panic!("Expected OutputItemAdded, got {other:?}"),
    }
    match &events[6].kind {
        StreamEventKind::FunctionCallArgumentsDone { arguments, .. } => {
            assert_eq!(arguments, r#"{"loc":"NYC"}"#);
        }
        other => panic!("Expected FunctionCallArgumentsDone, got {other:?}"),
    }
    match &events[8].kind {
        StreamEventKind::Completed { response } => {
            assert_eq!(response.stop_reason.as_deref(), Some("tool_calls"));
            assert_eq!(response.status, ResponseStatus::Completed);
            assert_eq!(response.usage, Some(usage(5, 5)));
            assert_eq!(response.model.as_deref(), Some("test-model"));
        }
        other => panic!("Expected Completed, got {other:?}"),
    }
}

fn mixed_stream() -> Vec<ConverseStreamEvent> {
    vendor_events(json!([
        {"messageStart": {"role": "assistant"}},
        {"contentBlockDelta": {"contentBlockIndex": 0, "delta": {"reasoningContent": {"text": "Think"}}}},
        {"contentBlockDelta": {"contentBlockIndex": 0, "delta": {"reasoningContent": {"signature": "sig"}}}},
        {"contentBlockStop": {"contentBlockIndex": 0}},
        {"contentBlockDelta": {"contentBlockIndex": 1, "delta": {"text": "Let me "}}},
        {"contentBlockDelta": {"contentBlockIndex": 1, "delta": {"text": "check."}}},
        {"contentBlockStop": {"contentBlockIndex": 1}},
        {"contentBlockStart": {"contentBlockIndex": 2, "start": {"toolUse": {"toolUseId": "t1", "name": "get_weather"}}}},
        {"contentBlockDelta": {"contentBlockIndex": 2, "delta": {"toolUse": {"input": "{}"}}}},
        {"contentBlockStop": {"contentBlockIndex": 2}},
        {"contentBlockStart": {"contentBlockIndex": 3, "start": {"toolUse": {"toolUseId": "t2", "name": "get_time"}}}},
        {"contentBlockStop": {"contentBlockIndex": 3}},
        {"messageStop": {"stopReason": "tool_use"}},
        {"metadata": {"usage": {"inputTokens": 10, "outputTokens": 20, "totalTokens": 30}}}
    ]))
}

#[test]
fn test_every_item_opens_and_closes_exactly_once() {
    let events = translate_all(&mixed_stream(), None);

    let mut added: HashMap<usize, usize> = HashMap::new();
    let mut done: HashMap<usize, usize> = HashMap::new();
    for (position, event) in events.iter().enumerate() {
        match &event.kind {
            StreamEventKind::OutputItemAdded { output_index, .. } => {
                assert!(added.insert(*output_index, position).is_none());
            }
            StreamEventKind::OutputItemDone { output_index, .. } => {
                assert!(done.insert(*output_index, position).is_none());
            }
            _ => {}
        }
    }
    assert_eq!(added.len(), 4);
    assert_eq!(added.len(), done.len());
    for (output_index, added_at) in &added {
        assert!(done[output_index] > *added_at);
    }
    assert_eq!(
        events.last().map(ResponsesStreamEvent::event_type),
        Some("response.completed")
    );
}

#[test]
fn test_sequence_numbers_are_strictly_increasing() {
    let events = translate_all(&mixed_stream(), None);
    for pair in events.windows(2) {
        assert_eq!(pair[1].sequence_number, pair[0].sequence_number + 1);
    }
    assert_eq!(events[0].sequence_number, 0);
}

#[test]
fn test_session_matches_manual_translation() {
    let pool = StreamStatePool::new(2);
    let mut session = ConverseStreamSession::new(&pool, Some("test-model".to_string()));
    let mut events = Vec::new();
    for event in &mixed_stream() {
        events.extend(session.push(event));
    }
    events.extend(session.finish(None));

    let manual = translate_all(&mixed_stream(), None);
    assert_eq!(events.len(), manual.len());
    let session_types: Vec<&str> = events.iter().map(ResponsesStreamEvent::event_type).collect();
    let manual_types: Vec<&str> = manual.iter().map(ResponsesStreamEvent::event_type).collect();
    assert_eq!(session_types, manual_types);

    // The session carries the metadata usage into the summary.
    match &events.last().expect("completed").kind {
        StreamEventKind::Completed { response } => {
            assert_eq!(response.usage.map(|usage| usage.total_tokens), Some(30));
        }
        other => panic!("Expected Completed, got {other:?}"),
    }
}

#[test]
fn test_reverse_translation_rebuilds_vendor_stream() {
    let forward = translate_all(
        &vendor_events(json!([
            {"messageStart": {"role": "assistant"}},
            {"contentBlockDelta": {"contentBlockIndex": 0, "delta": {"text": "Checking."}}},
            {"contentBlockStart": {"contentBlockIndex": 1, "start": {"toolUse": {"toolUseId": "t1", "name": "get_weather"}}}},
            {"contentBlockDelta": {"contentBlockIndex": 1, "delta": {"toolUse": {"input": "{\"loc\":\"NYC\"}"}}}},
            {"messageStop": {"stopReason": "tool_use"}}
        ])),
        Some(usage(5, 5)),
    );

    let vendor: Vec<ConverseStreamEvent> =
        forward.iter().flat_map(translate_responses_event).collect();
    let names: Vec<&str> = vendor.iter().map(ConverseStreamEvent::event_type).collect();
    assert_eq!(
        names,
        vec![
            "messageStart",
            "contentBlockDelta",
            "contentBlockStart",
            "contentBlockDelta",
            "messageStop",
            "metadata"
        ]
    );

    assert_eq!(vendor[2].content_block_index(), Some(1));
    match &vendor[3] {
        ConverseStreamEvent::ContentBlockDelta(delta) => {
            assert_eq!(delta.content_block_index, 1);
            assert!(matches!(&delta.delta, ContentBlockDelta::ToolUse(tool) if tool.input == r#"{"loc":"NYC"}"#));
        }
        other => panic!("Expected ContentBlockDelta, got {other:?}"),
    }
    match &vendor[4] {
        ConverseStreamEvent::MessageStop(stop) => assert_eq!(stop.stop_reason, "tool_use"),
        other => panic!("Expected MessageStop, got {other:?}"),
    }
    match &vendor[5] {
        ConverseStreamEvent::Metadata(metadata) => {
            assert_eq!(metadata.usage.map(|usage| usage.total_tokens), Some(10));
        }
        other => panic!("Expected Metadata, got {other:?}"),
    }
}

#[test]
fn test_unified_events_serialize_with_wire_names() {
    let events = translate_all(
        &vendor_events(json!([
            {"messageStart": {"role": "assistant"}},
            {"contentBlockDelta": {"contentBlockIndex": 0, "delta": {"text": "Hi"}}}
        ])),
        None,
    );
    let delta = serde_json::to_value(&events[4]).expect("serialize");
    assert_eq!(delta["type"], json!("response.output_text.delta"));
    assert_eq!(delta["sequence_number"], json!(4));
    assert_eq!(delta["delta"], json!("Hi"));
    assert_eq!(delta["output_index"], json!(0));

    let parsed: ResponsesStreamEvent = serde_json::from_value(delta).expect("parse back");
    assert_eq!(parsed, events[4]);
}
