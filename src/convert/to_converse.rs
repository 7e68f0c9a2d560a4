use crate::error::ConversionError;
use crate::protocol::converse::{
    CachePoint, ContentBlock, ConverseConversation, ConverseMessage, ConverseRole,
    ReasoningBlock, ReasoningText, SystemContentBlock, ToolResultBlock, ToolResultStatus,
    ToolUseBlock,
};
use crate::protocol::mapping::responses_role_to_converse;
use crate::protocol::payload::arguments_to_input;
use crate::protocol::responses::{
    FunctionCallItem, FunctionCallOutputItem, MessageContent, MessageItem, PartKind,
    ReasoningItem, ResponsesItem,
};

use super::content::{function_output_to_result_content, part_to_blocks_into};
use super::lifecycle::ToolCallLifecycle;

/// Convert unified items into a Converse conversation.
///
/// Function calls are grouped into one assistant turn and their outputs into the
/// following user turn. Buffered reasoning joins the preceding assistant turn
/// when one is last, and otherwise opens the next assistant turn.
/// Adjacent same-role turns are merged and no assistant turn ends in reasoning.
///
/// # Errors
///
/// Returns [`ConversionError::NilInput`] for an empty list, and fails on tool items
/// without a call id, unsupported parts, or image/file parts without payloads.
pub fn convert_responses_to_converse(
    items: &[ResponsesItem],
) -> Result<ConverseConversation, ConversionError> {
    if items.is_empty() {
        return Err(ConversionError::NilInput("items"));
    }

    let mut builder = TurnBuilder::default();
    for (index, item) in items.iter().enumerate() {
        if !item.is_reasoning() {
            builder.attach_reasoning_to_last_assistant();
        }
        match item {
            ResponsesItem::FunctionCall(call) => builder.register_call(call)?,
            ResponsesItem::FunctionCallOutput(output) => {
                builder.register_output(output)?;
                let next_is_output = items
                    .get(index + 1)
                    .is_some_and(ResponsesItem::is_function_call_output);
                if !next_is_output {
                    builder.flush_tool_turns(false);
                }
            }
            ResponsesItem::Message(message) => {
                builder.flush_tool_turns(false);
                builder.push_message(message)?;
            }
            ResponsesItem::Reasoning(reasoning) => builder.buffer_reasoning(reasoning),
        }
    }
    Ok(builder.finish())
}

#[derive(Default)]
struct TurnBuilder {
    lifecycle: ToolCallLifecycle,
    system: Vec<SystemContentBlock>,
    turns: Vec<ConverseMessage>,
    pending_reasoning: Vec<ContentBlock>,
}

impl TurnBuilder {
    fn register_call(&mut self, call: &FunctionCallItem) -> Result<(), ConversionError> {
        let call_id = required_call_id(call.call_id.as_deref(), "function_call")?;
        self.lifecycle
            .register_tool_call(call_id, &call.name, &call.arguments);
        Ok(())
    }

    fn register_output(&mut self, output: &FunctionCallOutputItem) -> Result<(), ConversionError> {
        let call_id = required_call_id(output.call_id.as_deref(), "function_call_output")?;
        let content = function_output_to_result_content(&output.output)?;
        let status = if output.is_error() {
            ToolResultStatus::Error
        } else {
            ToolResultStatus::Success
        };
        self.lifecycle.register_tool_result(call_id, content, status);
        Ok(())
    }

    /// Materialize pending calls as one assistant turn, then ready results as one
    /// user turn. Results whose call was never seen are held back until `finishing`.
    fn flush_tool_turns(&mut self, finishing: bool) {
        let call_ids = self.lifecycle.emit_pending_tool_calls();
        if !call_ids.is_empty() {
            let mut content = Vec::with_capacity(call_ids.len());
            for call_id in &call_ids {
                if let Some(call) = self.lifecycle.call(call_id) {
                    content.push(ContentBlock::ToolUse(ToolUseBlock {
                        tool_use_id: call.call_id.clone(),
                        name: call.name.clone(),
                        input: arguments_to_input(&call.arguments),
                    }));
                }
            }
            let turn_index = self.turns.len();
            self.push_assistant_turn(content);
            self.lifecycle.mark_tool_calls_emitted(&call_ids, turn_index);
        }

        if !self.lifecycle.has_pending_results() {
            return;
        }
        let mut ready = Vec::new();
        let mut content = Vec::new();
        for (call_id, result) in self.lifecycle.pending_results() {
            if self.lifecycle.call(call_id).is_none() {
                if !finishing {
                    continue;
                }
                tracing::warn!(call_id = %call_id, "emitting tool result without a matching tool call");
            }
            ready.push(call_id.clone());
            content.push(ContentBlock::ToolResult(ToolResultBlock {
                tool_use_id: call_id.clone(),
                content: result.content.clone(),
                status: Some(result.status),
            }));
        }
        if ready.is_empty() {
            return;
        }
        self.turns
            .push(ConverseMessage::new(ConverseRole::User, content));
        self.lifecycle.mark_results_emitted(&ready);
    }

    /// Prepend buffered reasoning to the last turn if it is an assistant turn.
    fn attach_reasoning_to_last_assistant(&mut self) {
        if self.pending_reasoning.is_empty() {
            return;
        }
        if let Some(turn) = self
            .turns
            .last_mut()
            .filter(|turn| turn.role == ConverseRole::Assistant)
        {
            turn.content.splice(0..0, self.pending_reasoning.drain(..));
        }
    }

    fn push_assistant_turn(&mut self, mut content: Vec<ContentBlock>) {
        if !self.pending_reasoning.is_empty() {
            content.splice(0..0, self.pending_reasoning.drain(..));
        }
        self.turns
            .push(ConverseMessage::new(ConverseRole::Assistant, content));
    }

    fn push_message(&mut self, message: &MessageItem) -> Result<(), ConversionError> {
        let Some(role) = responses_role_to_converse(message.role) else {
            return self.push_system(&message.content);
        };

        let mut content = Vec::new();
        match &message.content {
            MessageContent::Text(text) => content.push(ContentBlock::Text(text.clone())),
            MessageContent::Parts(parts) => {
                content.reserve(parts.len());
                for part in parts {
                    part_to_blocks_into(part, &mut content)?;
                }
            }
        }
        if content.is_empty() {
            tracing::debug!(?role, "skipping message with no content");
            return Ok(());
        }

        match role {
            ConverseRole::Assistant => self.push_assistant_turn(content),
            ConverseRole::User => self
                .turns
                .push(ConverseMessage::new(ConverseRole::User, content)),
        }
        Ok(())
    }

    fn push_system(&mut self, content: &MessageContent) -> Result<(), ConversionError> {
        match content {
            MessageContent::Text(text) => self.system.push(SystemContentBlock::Text(text.clone())),
            MessageContent::Parts(parts) => {
                for part in parts {
                    let Some(text) = part.text() else {
                        return Err(ConversionError::Unsupported(
                            "non-text content in a system message".to_string(),
                        ));
                    };
                    self.system.push(SystemContentBlock::Text(text.to_string()));
                    if part.cache_control.is_some() {
                        self.system
                            .push(SystemContentBlock::CachePoint(CachePoint::default()));
                    }
                }
            }
        }
        Ok(())
    }

    fn buffer_reasoning(&mut self, reasoning: &ReasoningItem) {
        let before = self.pending_reasoning.len();
        for part in &reasoning.content {
            let (text, signature) = match &part.kind {
                PartKind::ReasoningText { text, signature } => (text.clone(), signature.clone()),
                other => match part.text() {
                    Some(text) => (text.to_string(), None),
                    None => {
                        tracing::debug!(?other, "skipping non-text reasoning content");
                        continue;
                    }
                },
            };
            self.pending_reasoning.push(reasoning_block(text, signature));
        }
        if self.pending_reasoning.len() == before {
            for summary in &reasoning.summary {
                self.pending_reasoning
                    .push(reasoning_block(summary.text.clone(), None));
            }
        }
        if let Some(encrypted) = &reasoning.encrypted_content {
            self.pending_reasoning
                .push(ContentBlock::ReasoningContent(ReasoningBlock::RedactedContent(
                    encrypted.clone(),
                )));
        }
    }

    fn finish(mut self) -> ConverseConversation {
        self.flush_tool_turns(true);

        if !self.pending_reasoning.is_empty() {
            match self.turns.last_mut() {
                Some(turn) if turn.role == ConverseRole::Assistant => {
                    turn.content.splice(0..0, self.pending_reasoning.drain(..));
                }
                _ => {
                    tracing::debug!(
                        blocks = self.pending_reasoning.len(),
                        "dropping reasoning with no assistant turn to carry it"
                    );
                    self.pending_reasoning.clear();
                }
            }
        }

        let mut turns = merge_adjacent_turns(self.turns);
        if enforce_reasoning_placement(&mut turns) {
            turns = merge_adjacent_turns(turns);
        }
        ConverseConversation {
            system: self.system,
            messages: turns,
        }
    }
}

fn required_call_id<'a>(
    call_id: Option<&'a str>,
    context: &'static str,
) -> Result<&'a str, ConversionError> {
    call_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ConversionError::missing(context, "call_id"))
}

fn reasoning_block(text: String, signature: Option<String>) -> ContentBlock {
    ContentBlock::ReasoningContent(ReasoningBlock::ReasoningText(ReasoningText {
        text,
        signature,
    }))
}

/// Merge adjacent turns that share a role, keeping block order.
#[must_use]
pub fn merge_adjacent_turns(turns: Vec<ConverseMessage>) -> Vec<ConverseMessage> {
    let mut merged: Vec<ConverseMessage> = Vec::with_capacity(turns.len());
    for turn in turns {
        match merged.last_mut() {
            Some(last) if last.role == turn.role => last.content.extend(turn.content),
            _ => merged.push(turn),
        }
    }
    merged
}

/// Move any trailing run of reasoning blocks in an assistant turn to its front,
/// and drop assistant turns holding nothing but reasoning.
///
/// Returns whether a turn was dropped.
fn enforce_reasoning_placement(turns: &mut Vec<ConverseMessage>) -> bool {
    let before = turns.len();
    turns.retain_mut(|turn| {
        if turn.role != ConverseRole::Assistant {
            return true;
        }
        let trailing = turn
            .content
            .iter()
            .rev()
            .take_while(|block| block.is_reasoning())
            .count();
        if trailing == 0 {
            return true;
        }
        if trailing == turn.content.len() {
            tracing::debug!("dropping assistant turn holding only reasoning");
            return false;
        }
        turn.content.rotate_right(trailing);
        true
    });
    turns.len() != before
}
