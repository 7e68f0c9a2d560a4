pub mod finalize;
pub mod reverse;
pub mod state;
pub mod translator;

pub use finalize::{finalize_stream, finalize_stream_into};
pub use reverse::{translate_responses_event, ConverseEvents};
pub use state::{OutputSlot, PooledStreamState, SlotKind, StreamState, StreamStatePool};
pub use translator::{translate_converse_event, translate_converse_event_into};

use crate::protocol::converse::ConverseStreamEvent;
use crate::protocol::mapping::converse_usage_to_responses;
use crate::protocol::responses::{ResponsesStreamEvent, ResponsesUsage};

/// One Converse stream being translated into Responses events.
///
/// Owns a pooled [`StreamState`] and the running sequence number. `finish`
/// consumes the session, so finalization happens at most once.
pub struct ConverseStreamSession<'a> {
    state: PooledStreamState<'a>,
    next_sequence: u64,
    usage: Option<ResponsesUsage>,
    finished: bool,
}

impl<'a> ConverseStreamSession<'a> {
    #[must_use]
    pub fn new(pool: &'a StreamStatePool, model: Option<String>) -> Self {
        let mut state = pool.acquire();
        state.set_model(model);
        Self {
            state,
            next_sequence: 0,
            usage: None,
            finished: false,
        }
    }

    /// Translate one vendor event, returning the unified events it produced.
    pub fn push(&mut self, event: &ConverseStreamEvent) -> Vec<ResponsesStreamEvent> {
        if let ConverseStreamEvent::Metadata(metadata) = event {
            if let Some(usage) = &metadata.usage {
                self.usage = Some(converse_usage_to_responses(usage));
            }
        }
        let events = translate_converse_event(event, self.next_sequence, &mut self.state);
        self.next_sequence += events.len() as u64;
        events
    }

    /// Close every open item and emit `response.completed`.
    ///
    /// `usage` overrides the usage seen in the stream's `metadata` event.
    #[must_use]
    pub fn finish(mut self, usage: Option<ResponsesUsage>) -> Vec<ResponsesStreamEvent> {
        self.finished = true;
        let usage = usage.or(self.usage);
        let events = finalize_stream(&mut self.state, self.next_sequence, usage);
        self.next_sequence += events.len() as u64;
        events
    }

    /// Usage reported by the vendor stream so far.
    #[must_use]
    pub fn usage(&self) -> Option<ResponsesUsage> {
        self.usage
    }

    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    #[must_use]
    pub fn state(&self) -> &StreamState {
        &self.state
    }
}

impl Drop for ConverseStreamSession<'_> {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                message_id = self.state.message_id().unwrap_or_default(),
                open_items = self.state.slots().iter().filter(|slot| !slot.completed).count(),
                "stream session dropped before finish"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::converse::{MetadataEvent, TokenUsage};
    use crate::protocol::responses::StreamEventKind;
    use serde_json::json;

    fn events(values: serde_json::Value) -> Vec<ConverseStreamEvent> {
        serde_json::from_value(values).unwrap()
    }

    #[test]
    fn test_session_sequence_is_monotonic() {
        let pool = StreamStatePool::new(4);
        let mut session = ConverseStreamSession::new(&pool, Some("m".into()));
        let mut all = Vec::new();
        for event in events(json!([
            {"messageStart": {"role": "assistant"}},
            {"contentBlockDelta": {"contentBlockIndex": 0, "delta": {"text": "Hi"}}},
            {"contentBlockDelta": {"contentBlockIndex": 0, "delta": {"text": " there"}}},
            {"contentBlockStop": {"contentBlockIndex": 0}},
            {"messageStop": {"stopReason": "end_turn"}}
        ])) {
            all.extend(session.push(&event));
        }
        all.extend(session.finish(None));

        for (expected, event) in all.iter().enumerate() {
            assert_eq!(event.sequence_number, expected as u64);
        }
        assert_eq!(all.last().map(ResponsesStreamEvent::event_type), Some("response.completed"));
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_session_uses_metadata_usage() {
        let pool = StreamStatePool::new(1);
        let mut session = ConverseStreamSession::new(&pool, None);
        session.push(&ConverseStreamEvent::Metadata(MetadataEvent {
            usage: Some(TokenUsage {
                input_tokens: 2,
                output_tokens: 3,
                total_tokens: 5,
                cache_read_input_tokens: None,
                cache_write_input_tokens: None,
            }),
            metrics: None,
        }));
        assert_eq!(session.usage().map(|usage| usage.total_tokens), Some(5));
        let events = session.finish(None);
        let StreamEventKind::Completed { response } = &events[0].kind else {
            panic!("Expected Completed");
        };
        assert_eq!(response.usage.map(|usage| usage.total_tokens), Some(5));
    }

    #[test]
    fn test_explicit_usage_wins() {
        let pool = StreamStatePool::new(1);
        let session = ConverseStreamSession::new(&pool, None);
        let usage = ResponsesUsage {
            input_tokens: 1,
            output_tokens: 1,
            total_tokens: 2,
            input_tokens_details: None,
        };
        let events = session.finish(Some(usage));
        let StreamEventKind::Completed { response } = &events[0].kind else {
            panic!("Expected Completed");
        };
        assert_eq!(response.usage, Some(usage));
    }

    #[test]
    fn test_dropped_session_returns_state_to_pool() {
        let pool = StreamStatePool::new(1);
        {
            let mut session = ConverseStreamSession::new(&pool, None);
            session.push(&ConverseStreamEvent::ContentBlockDelta(
                serde_json::from_value(json!({"contentBlockIndex": 0, "delta": {"text": "x"}}))
                    .unwrap(),
            ));
        }
        assert_eq!(pool.idle_count(), 1);
        assert!(pool.acquire().slots().is_empty());
    }
}
