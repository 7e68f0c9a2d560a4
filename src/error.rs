/// Error type shared by every whole-message and whole-response conversion.
///
/// Streaming translation never returns this: unknown stream shapes are skipped.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("nil input: {0}")]
    NilInput(&'static str),
    #[error("{context} is missing required field `{field}`")]
    MissingField {
        context: &'static str,
        field: &'static str,
    },
    #[error("{0} block is missing its payload")]
    MissingPayload(&'static str),
    #[error("unsupported content: {0}")]
    Unsupported(String),
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Broad error category, used by callers choosing how to report a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Unsupported,
}

impl ConversionError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConversionError::NilInput(_)
            | ConversionError::MissingField { .. }
            | ConversionError::MissingPayload(_)
            | ConversionError::InvalidImage(_) => ErrorCategory::InvalidRequest,
            ConversionError::Unsupported(_) => ErrorCategory::Unsupported,
        }
    }

    pub(crate) fn missing(context: &'static str, field: &'static str) -> Self {
        ConversionError::MissingField { context, field }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message_names_field() {
        let err = ConversionError::missing("function_call_output", "call_id");
        assert_eq!(
            err.to_string(),
            "function_call_output is missing required field `call_id`"
        );
        assert_eq!(err.category(), ErrorCategory::InvalidRequest);
    }

    #[test]
    fn test_unsupported_category() {
        let err = ConversionError::Unsupported("audio input".to_string());
        assert_eq!(err.to_string(), "unsupported content: audio input");
        assert_eq!(err.category(), ErrorCategory::Unsupported);
    }

    #[test]
    fn test_nil_input_message() {
        assert_eq!(
            ConversionError::NilInput("conversation").to_string(),
            "nil input: conversation"
        );
    }
}
