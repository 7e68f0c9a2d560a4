use serde_json::{Map, Value};

/// A loosely-typed tool argument or tool result, classified once.
///
/// `Json` holds a top-level object (key order preserved); `Raw` holds any other
/// JSON value; `Text` holds content that is not JSON at all.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Text(String),
    Json(Map<String, Value>),
    Raw(Value),
}

impl ToolPayload {
    /// Classify a tool output string.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => ToolPayload::Json(map),
            Ok(other) => ToolPayload::Raw(other),
            Err(_) => ToolPayload::Text(text.to_string()),
        }
    }

    /// Classify an already-decoded JSON value.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => ToolPayload::Json(map),
            Value::String(text) => ToolPayload::Text(text),
            other => ToolPayload::Raw(other),
        }
    }

    /// The payload as a JSON object, wrapping non-object values so the vendor's
    /// object-only JSON slots can carry them.
    ///
    /// Arrays become `{"results": [...]}`, other scalars `{"value": v}`.
    /// Returns `None` for text payloads.
    #[must_use]
    pub fn to_json_object(&self) -> Option<Map<String, Value>> {
        match self {
            ToolPayload::Text(_) => None,
            ToolPayload::Json(map) => Some(map.clone()),
            ToolPayload::Raw(value @ Value::Array(_)) => {
                let mut map = Map::with_capacity(1);
                map.insert("results".to_string(), value.clone());
                Some(map)
            }
            ToolPayload::Raw(value) => {
                let mut map = Map::with_capacity(1);
                map.insert("value".to_string(), value.clone());
                Some(map)
            }
        }
    }

    /// Render the payload back to the string form used by unified items.
    #[must_use]
    pub fn to_output_string(&self) -> String {
        match self {
            ToolPayload::Text(text) => text.clone(),
            ToolPayload::Json(map) => {
                serde_json::to_string(map).unwrap_or_else(|_| "{}".to_string())
            }
            ToolPayload::Raw(value) => value.to_string(),
        }
    }
}

/// Parse tool-call arguments into the vendor's object-shaped input.
///
/// Malformed or non-object arguments fall back to an empty object.
#[must_use]
pub fn arguments_to_input(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(arguments) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            tracing::debug!(kind = json_kind(&other), "tool arguments are not an object");
            Value::Object(Map::new())
        }
        Err(err) => {
            tracing::debug!(error = %err, "tool arguments are not valid JSON");
            Value::Object(Map::new())
        }
    }
}

/// Serialize a vendor tool input to its canonical compact string.
#[must_use]
pub fn input_to_arguments(input: &Value) -> String {
    match input {
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_object_keeps_key_order() {
        let payload = ToolPayload::parse(r#"{"zeta":1,"alpha":2}"#);
        let ToolPayload::Json(map) = &payload else {
            panic!("Expected Json payload");
        };
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(payload.to_output_string(), r#"{"zeta":1,"alpha":2}"#);
    }

    #[test]
    fn test_parse_array_and_scalar() {
        let array = ToolPayload::parse("[1,2]");
        assert_eq!(
            Value::Object(array.to_json_object().unwrap()),
            json!({"results": [1, 2]})
        );
        let scalar = ToolPayload::parse("42");
        assert_eq!(
            Value::Object(scalar.to_json_object().unwrap()),
            json!({"value": 42})
        );
    }

    #[test]
    fn test_parse_plain_text() {
        let payload = ToolPayload::parse("sunny, 72F");
        assert_eq!(payload, ToolPayload::Text("sunny, 72F".to_string()));
        assert!(payload.to_json_object().is_none());
        assert_eq!(payload.to_output_string(), "sunny, 72F");
    }

    #[test]
    fn test_from_value() {
        assert!(matches!(
            ToolPayload::from_value(json!({"a": 1})),
            ToolPayload::Json(_)
        ));
        assert_eq!(
            ToolPayload::from_value(json!("hi")),
            ToolPayload::Text("hi".to_string())
        );
        assert_eq!(ToolPayload::from_value(json!(true)), ToolPayload::Raw(json!(true)));
    }

    #[test]
    fn test_arguments_to_input_falls_back_to_empty_object() {
        assert_eq!(arguments_to_input(r#"{"loc":"NYC"}"#), json!({"loc": "NYC"}));
        assert_eq!(arguments_to_input(r#"{"loc"#), json!({}));
        assert_eq!(arguments_to_input(""), json!({}));
        assert_eq!(arguments_to_input("[1]"), json!({}));
    }

    #[test]
    fn test_input_to_arguments() {
        assert_eq!(input_to_arguments(&Value::Null), "{}");
        assert_eq!(input_to_arguments(&json!({"b":1,"a":2})), r#"{"b":1,"a":2}"#);
    }
}
