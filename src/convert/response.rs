use crate::error::ConversionError;
use crate::protocol::converse::{
    ContentBlock, ConverseMessage, ConverseOutput, ConverseResponse, ConverseRole,
};
use crate::protocol::mapping::{
    converse_stop_to_finish, converse_usage_to_responses, finish_to_incomplete_reason,
    incomplete_reason_to_converse_stop, responses_usage_to_converse, unified_stop_to_converse,
};
use crate::protocol::responses::{IncompleteDetails, ResponseStatus, ResponsesResponse};
use crate::util::{generate_id, unix_now_secs};

use super::to_converse::convert_responses_to_converse;
use super::to_responses::message_to_items_into;
use super::ConvertOptions;

/// Convert a non-streaming Converse response into a Responses `response` object.
///
/// # Errors
///
/// Fails when the output message holds a block that cannot be converted.
pub fn converse_response_to_responses(
    response: &ConverseResponse,
    model: Option<&str>,
    options: &ConvertOptions,
) -> Result<ResponsesResponse, ConversionError> {
    let ConverseOutput::Message(message) = &response.output;
    let options = options.clone().for_output();

    let mut output = Vec::with_capacity(message.content.len());
    message_to_items_into(message, &options, &mut output)?;

    let finish = converse_stop_to_finish(&response.stop_reason);
    let incomplete = finish_to_incomplete_reason(finish);

    let mut unified = ResponsesResponse::new(
        generate_id("resp"),
        unix_now_secs(),
        if incomplete.is_some() {
            ResponseStatus::Incomplete
        } else {
            ResponseStatus::Completed
        },
    );
    unified.model = model.map(str::to_string);
    unified.output = output;
    unified.usage = response.usage.as_ref().map(converse_usage_to_responses);
    unified.stop_reason = Some(finish.as_str().to_string());
    unified.incomplete_details = incomplete.map(|reason| IncompleteDetails {
        reason: reason.to_string(),
    });
    Ok(unified)
}

/// Convert a Responses `response` object into a non-streaming Converse response.
///
/// Every produced turn is folded into one assistant message.
///
/// # Errors
///
/// Fails when an output item cannot be converted.
pub fn responses_to_converse_response(
    response: &ResponsesResponse,
) -> Result<ConverseResponse, ConversionError> {
    let content: Vec<ContentBlock> = if response.output.is_empty() {
        Vec::new()
    } else {
        convert_responses_to_converse(&response.output)?
            .messages
            .into_iter()
            .flat_map(|turn| turn.content)
            .collect()
    };

    let stop_reason = match (&response.incomplete_details, &response.stop_reason) {
        (Some(details), _) => incomplete_reason_to_converse_stop(&details.reason),
        _ if content.iter().any(ContentBlock::is_tool_use) => "tool_use",
        (None, Some(reason)) => unified_stop_to_converse(reason),
        (None, None) => "end_turn",
    };

    Ok(ConverseResponse {
        output: ConverseOutput::Message(ConverseMessage::new(ConverseRole::Assistant, content)),
        stop_reason: stop_reason.to_string(),
        usage: response.usage.as_ref().map(responses_usage_to_converse),
        metrics: None,
    })
}
