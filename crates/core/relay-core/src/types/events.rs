//! Activity timeline entries

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload of a timeline entry
///
/// Serialized with a `type` tag (`text`, `functionCall`, `functionResponse`,
/// `sources`, `raw`) so front-ends can switch on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventData {
    /// Plain text emitted by a non-primary agent
    Text { content: String },
    /// A tool invocation requested by an agent
    FunctionCall {
        name: Option<String>,
        args: Option<Value>,
        id: Option<String>,
    },
    /// The result of a tool invocation
    FunctionResponse {
        name: Option<String>,
        response: Option<Value>,
        id: Option<String>,
    },
    /// Retrieved sources, keyed by short id; each value usually has `title` and `url`
    Sources { content: Map<String, Value> },
    /// Anything the classifier could not map onto a known shape
    Raw { content: Value },
}

/// One entry in the activity timeline of an AI message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEvent {
    pub title: String,
    pub data: EventData,
}

impl ProcessedEvent {
    pub fn new(title: impl Into<String>, data: EventData) -> Self {
        Self {
            title: title.into(),
            data,
        }
    }

    pub fn is_function_call(&self) -> bool {
        matches!(self.data, EventData::FunctionCall { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_data_is_type_tagged() {
        let ev = ProcessedEvent::new(
            "Function Call: search",
            EventData::FunctionCall {
                name: Some("search".into()),
                args: Some(json!({"q": "rust"})),
                id: Some("call-1".into()),
            },
        );
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["data"]["type"], "functionCall");
        assert_eq!(json["data"]["args"]["q"], "rust");

        let back: ProcessedEvent = serde_json::from_value(json).unwrap();
        assert!(back.is_function_call());
    }
}
