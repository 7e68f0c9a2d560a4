use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::protocol::converse::{ToolResultContent, ToolResultStatus};

/// Where a tool call is in its journey from registration to a matched result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallState {
    Initialized,
    Queued,
    Emitted,
    AwaitingResult,
    Completed,
}

/// A tool result waiting to be placed in a user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub content: Vec<ToolResultContent>,
    pub status: ToolResultStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: String,
    pub state: ToolCallState,
    pub assistant_turn_index: Option<usize>,
    pub result: Option<ToolResult>,
}

/// Tracks tool calls and results during one conversion pass.
///
/// Calls leave in registration order as one batch; results leave in registration
/// order as one batch. The manager is created per pass and dropped at its end.
#[derive(Debug, Default)]
pub struct ToolCallLifecycle {
    calls: FxHashMap<String, ToolCall>,
    pending_calls: Vec<String>,
    pending_results: IndexMap<String, ToolResult>,
}

impl ToolCallLifecycle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call. A second registration of a known id is a no-op.
    pub fn register_tool_call(&mut self, call_id: &str, name: &str, arguments: &str) {
        if self.calls.contains_key(call_id) {
            return;
        }
        self.calls.insert(
            call_id.to_string(),
            ToolCall {
                call_id: call_id.to_string(),
                name: name.to_string(),
                arguments: arguments.to_string(),
                state: ToolCallState::Initialized,
                assistant_turn_index: None,
                result: None,
            },
        );
        self.pending_calls.push(call_id.to_string());
    }

    /// Store a result for `call_id`. The call completes only once the result has
    /// been placed in a user turn, see [`Self::mark_results_emitted`].
    pub fn register_tool_result(
        &mut self,
        call_id: &str,
        content: Vec<ToolResultContent>,
        status: ToolResultStatus,
    ) {
        let result = ToolResult { content, status };
        match self.calls.get_mut(call_id) {
            Some(call) => call.result = Some(result.clone()),
            None => {
                tracing::debug!(call_id, "tool result registered before its tool call");
            }
        }
        self.pending_results.insert(call_id.to_string(), result);
    }

    /// Drain every pending call in registration order, marking each queued.
    pub fn emit_pending_tool_calls(&mut self) -> Vec<String> {
        let drained = std::mem::take(&mut self.pending_calls);
        for call_id in &drained {
            if let Some(call) = self.calls.get_mut(call_id) {
                call.state = ToolCallState::Queued;
            }
        }
        drained
    }

    /// Record that `call_ids` were materialized in assistant turn `turn_index`.
    pub fn mark_tool_calls_emitted(&mut self, call_ids: &[String], turn_index: usize) {
        for call_id in call_ids {
            if let Some(call) = self.calls.get_mut(call_id) {
                call.state = if call.result.is_some() {
                    ToolCallState::Emitted
                } else {
                    ToolCallState::AwaitingResult
                };
                call.assistant_turn_index = Some(turn_index);
            }
        }
    }

    #[must_use]
    pub fn pending_results(&self) -> &IndexMap<String, ToolResult> {
        &self.pending_results
    }

    /// Remove emitted results from the pending set and complete their calls.
    pub fn mark_results_emitted(&mut self, call_ids: &[String]) {
        for call_id in call_ids {
            self.pending_results.shift_remove(call_id);
            if let Some(call) = self.calls.get_mut(call_id) {
                call.state = ToolCallState::Completed;
            }
        }
    }

    #[must_use]
    pub fn has_pending_tool_calls(&self) -> bool {
        !self.pending_calls.is_empty()
    }

    #[must_use]
    pub fn has_pending_results(&self) -> bool {
        !self.pending_results.is_empty()
    }

    #[must_use]
    pub fn call(&self, call_id: &str) -> Option<&ToolCall> {
        self.calls.get(call_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_result(text: &str) -> Vec<ToolResultContent> {
        vec![ToolResultContent::Text(text.to_string())]
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut lifecycle = ToolCallLifecycle::new();
        lifecycle.register_tool_call("a", "f", "{}");
        lifecycle.register_tool_call("a", "g", r#"{"x":1}"#);
        let emitted = lifecycle.emit_pending_tool_calls();
        assert_eq!(emitted, vec!["a".to_string()]);
        assert_eq!(lifecycle.call("a").unwrap().name, "f");
    }

    #[test]
    fn test_emit_drains_in_registration_order() {
        let mut lifecycle = ToolCallLifecycle::new();
        for id in ["c", "a", "b"] {
            lifecycle.register_tool_call(id, "f", "{}");
        }
        assert!(lifecycle.has_pending_tool_calls());
        let emitted = lifecycle.emit_pending_tool_calls();
        assert_eq!(emitted, vec!["c", "a", "b"]);
        assert!(!lifecycle.has_pending_tool_calls());
        assert!(lifecycle.emit_pending_tool_calls().is_empty());
        assert_eq!(lifecycle.call("a").unwrap().state, ToolCallState::Queued);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut lifecycle = ToolCallLifecycle::new();
        lifecycle.register_tool_call("a", "f", "{}");
        assert_eq!(lifecycle.call("a").unwrap().state, ToolCallState::Initialized);

        let ids = lifecycle.emit_pending_tool_calls();
        lifecycle.mark_tool_calls_emitted(&ids, 1);
        let call = lifecycle.call("a").unwrap();
        assert_eq!(call.state, ToolCallState::AwaitingResult);
        assert_eq!(call.assistant_turn_index, Some(1));

        lifecycle.register_tool_result("a", text_result("ok"), ToolResultStatus::Success);
        // Not complete until the result is placed in a user turn.
        assert_eq!(lifecycle.call("a").unwrap().state, ToolCallState::AwaitingResult);
        assert!(lifecycle.has_pending_results());

        lifecycle.mark_results_emitted(&ids);
        assert!(!lifecycle.has_pending_results());
        assert_eq!(lifecycle.call("a").unwrap().state, ToolCallState::Completed);
    }

    #[test]
    fn test_result_before_emission_waits() {
        let mut lifecycle = ToolCallLifecycle::new();
        lifecycle.register_tool_call("a", "f", "{}");
        lifecycle.register_tool_result("a", text_result("ok"), ToolResultStatus::Error);
        assert_eq!(lifecycle.call("a").unwrap().state, ToolCallState::Initialized);

        let ids = lifecycle.emit_pending_tool_calls();
        lifecycle.mark_tool_calls_emitted(&ids, 0);
        assert_eq!(lifecycle.call("a").unwrap().state, ToolCallState::Emitted);

        let pending = lifecycle.pending_results();
        assert_eq!(pending["a"].status, ToolResultStatus::Error);
        lifecycle.mark_results_emitted(&ids);
        assert_eq!(lifecycle.call("a").unwrap().state, ToolCallState::Completed);
    }

    #[test]
    fn test_pending_results_keep_registration_order() {
        let mut lifecycle = ToolCallLifecycle::new();
        for id in ["z", "m", "a"] {
            lifecycle.register_tool_call(id, "f", "{}");
            lifecycle.register_tool_result(id, text_result(id), ToolResultStatus::Success);
        }
        let order: Vec<&str> = lifecycle.pending_results().keys().map(String::as_str).collect();
        assert_eq!(order, vec!["z", "m", "a"]);
    }

    #[test]
    fn test_orphan_result_is_kept() {
        let mut lifecycle = ToolCallLifecycle::new();
        lifecycle.register_tool_result("ghost", text_result("?"), ToolResultStatus::Success);
        assert!(lifecycle.has_pending_results());
        assert!(lifecycle.call("ghost").is_none());
    }
}
