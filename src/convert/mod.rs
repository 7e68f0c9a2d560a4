pub(crate) mod content;
pub mod lifecycle;
pub mod response;
pub mod to_converse;
pub mod to_responses;

pub use lifecycle::{ToolCall, ToolCallLifecycle, ToolCallState, ToolResult};
pub use response::{converse_response_to_responses, responses_to_converse_response};
pub use to_converse::{convert_responses_to_converse, merge_adjacent_turns};
pub use to_responses::convert_converse_to_responses;

use crate::config::ConversionConfig;

/// Options for the vendor → unified direction.
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    /// Tool name reserved for structured output. A call to it becomes an
    /// assistant text message carrying the tool input as JSON.
    pub structured_output_tool: Option<String>,
    /// Set when converting model output rather than request history: items get
    /// ids and assistant text is emitted as `output_text`.
    pub is_output: bool,
}

impl ConvertOptions {
    #[must_use]
    pub fn from_config(config: &ConversionConfig) -> Self {
        Self {
            structured_output_tool: config.structured_output_tool.clone(),
            is_output: false,
        }
    }

    #[must_use]
    pub fn for_output(mut self) -> Self {
        self.is_output = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = ConversionConfig {
            structured_output_tool: Some("emit_json".to_string()),
        };
        let options = ConvertOptions::from_config(&config);
        assert_eq!(options.structured_output_tool.as_deref(), Some("emit_json"));
        assert!(!options.is_output);
        assert!(options.for_output().is_output);
    }
}
