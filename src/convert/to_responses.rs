use crate::error::ConversionError;
use crate::protocol::converse::{
    ContentBlock, ConverseConversation, ConverseMessage, ReasoningBlock, SystemContentBlock,
    ToolResultBlock, ToolResultStatus, ToolUseBlock,
};
use crate::protocol::mapping::converse_role_to_responses;
use crate::protocol::payload::input_to_arguments;
use crate::protocol::responses::{
    CacheControl, ContentPart, FunctionCallItem, FunctionCallOutputItem, FunctionOutput,
    ItemStatus, MessageContent, MessageItem, ReasoningItem, ResponsesItem, ResponsesRole,
};
use crate::util::generate_id;

use super::content::{document_to_part, image_to_part, result_content_to_output};
use super::ConvertOptions;

/// Convert a Converse conversation into unified items.
///
/// # Errors
///
/// Returns [`ConversionError::NilInput`] for an empty conversation, and fails on
/// tool blocks without ids or image/document blocks without payloads.
pub fn convert_converse_to_responses(
    conversation: &ConverseConversation,
    options: &ConvertOptions,
) -> Result<Vec<ResponsesItem>, ConversionError> {
    if conversation.messages.is_empty() && conversation.system.is_empty() {
        return Err(ConversionError::NilInput("conversation"));
    }

    let mut items = Vec::with_capacity(conversation.system.len() + conversation.messages.len());
    system_to_items_into(&conversation.system, &mut items);
    for message in &conversation.messages {
        message_to_items_into(message, options, &mut items)?;
    }
    Ok(items)
}

/// Convert system blocks into system-role message items.
pub fn system_to_items_into(system: &[SystemContentBlock], out: &mut Vec<ResponsesItem>) {
    let start = out.len();
    for block in system {
        match block {
            SystemContentBlock::Text(text) => out.push(ResponsesItem::Message(MessageItem {
                id: None,
                role: ResponsesRole::System,
                status: Some(ItemStatus::Completed),
                content: MessageContent::Parts(vec![ContentPart::input_text(text.clone())]),
            })),
            SystemContentBlock::CachePoint(_) => mark_last_part_cached(&mut out[start..]),
        }
    }
}

/// Convert one Converse message, appending the produced items to `out`.
///
/// All reasoning blocks of the message are gathered into one reasoning item that
/// is placed before the message's other items.
///
/// # Errors
///
/// Fails on tool blocks without ids or image/document blocks without payloads.
pub fn message_to_items_into(
    message: &ConverseMessage,
    options: &ConvertOptions,
    out: &mut Vec<ResponsesItem>,
) -> Result<(), ConversionError> {
    let start = out.len();
    let role = converse_role_to_responses(message.role);
    let mut reasoning: Option<ReasoningItem> = None;

    for block in &message.content {
        match block {
            ContentBlock::Text(text) => {
                let part = if role == ResponsesRole::Assistant || options.is_output {
                    ContentPart::output_text(text.clone())
                } else {
                    ContentPart::input_text(text.clone())
                };
                out.push(message_item(role, part, options));
            }
            ContentBlock::Image(image) => {
                out.push(message_item(role, image_to_part(image)?, options));
            }
            ContentBlock::Document(document) => {
                out.push(message_item(role, document_to_part(document)?, options));
            }
            ContentBlock::ToolUse(tool_use) => out.push(tool_use_to_item(tool_use, options)?),
            ContentBlock::ToolResult(result) => out.push(tool_result_to_item(result)?),
            ContentBlock::ReasoningContent(block) => {
                let item = reasoning.get_or_insert_with(|| ReasoningItem {
                    id: Some(generate_id("rs")),
                    summary: Vec::new(),
                    content: Vec::new(),
                    encrypted_content: None,
                    status: Some(ItemStatus::Completed),
                });
                push_reasoning_block(item, block);
            }
            ContentBlock::CachePoint(_) => mark_last_part_cached(&mut out[start..]),
        }
    }

    if let Some(reasoning) = reasoning {
        out.insert(start, ResponsesItem::Reasoning(reasoning));
    }
    Ok(())
}

fn message_item(role: ResponsesRole, part: ContentPart, options: &ConvertOptions) -> ResponsesItem {
    ResponsesItem::Message(MessageItem {
        id: options.is_output.then(|| generate_id("msg")),
        role,
        status: Some(ItemStatus::Completed),
        content: MessageContent::Parts(vec![part]),
    })
}

fn tool_use_to_item(
    tool_use: &ToolUseBlock,
    options: &ConvertOptions,
) -> Result<ResponsesItem, ConversionError> {
    if tool_use.tool_use_id.is_empty() {
        return Err(ConversionError::missing("toolUse", "toolUseId"));
    }
    let arguments = input_to_arguments(&tool_use.input);

    if options
        .structured_output_tool
        .as_deref()
        .is_some_and(|name| name == tool_use.name)
    {
        return Ok(message_item(
            ResponsesRole::Assistant,
            ContentPart::output_text(arguments),
            options,
        ));
    }

    Ok(ResponsesItem::FunctionCall(FunctionCallItem {
        id: options.is_output.then(|| tool_use.tool_use_id.clone()),
        call_id: Some(tool_use.tool_use_id.clone()),
        name: tool_use.name.clone(),
        arguments,
        status: Some(ItemStatus::Completed),
    }))
}

fn tool_result_to_item(result: &ToolResultBlock) -> Result<ResponsesItem, ConversionError> {
    if result.tool_use_id.is_empty() {
        return Err(ConversionError::missing("toolResult", "toolUseId"));
    }
    let status = match result.status {
        Some(ToolResultStatus::Error) => "error",
        Some(ToolResultStatus::Success) | None => "completed",
    };
    Ok(ResponsesItem::FunctionCallOutput(FunctionCallOutputItem {
        id: None,
        call_id: Some(result.tool_use_id.clone()),
        output: FunctionOutput::Text(result_content_to_output(&result.content)),
        status: Some(status.to_string()),
    }))
}

fn push_reasoning_block(item: &mut ReasoningItem, block: &ReasoningBlock) {
    match block {
        ReasoningBlock::ReasoningText(reasoning) => item.content.push(ContentPart::reasoning_text(
            reasoning.text.clone(),
            reasoning.signature.clone(),
        )),
        ReasoningBlock::RedactedContent(data) => {
            if item.encrypted_content.is_none() {
                item.encrypted_content = Some(data.clone());
            } else {
                tracing::debug!("dropping additional redacted reasoning block");
            }
        }
    }
}

/// Attach an ephemeral cache hint to the last part of the last message item.
fn mark_last_part_cached(items: &mut [ResponsesItem]) {
    let Some(last) = items.last_mut() else {
        tracing::debug!("cache point with no preceding content");
        return;
    };
    match last {
        ResponsesItem::Message(MessageItem {
            content: MessageContent::Parts(parts),
            ..
        }) => {
            if let Some(part) = parts.last_mut() {
                part.cache_control = Some(CacheControl::ephemeral());
            }
        }
        _ => tracing::debug!("cache point after a non-message item"),
    }
}
