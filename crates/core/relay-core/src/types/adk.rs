//! Wire types exchanged with the ADK server
//!
//! Field names follow the ADK JSON (camelCase on requests, a mix on
//! `stateDelta` keys). Event payload fields are all optional: the shape
//! varies by author and nothing is assumed present.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Keep a field only if it has the expected shape; anything else reads as absent
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Keep the elements of a list that have the expected shape
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| serde_json::from_value(item).ok())
                .collect(),
        ),
        _ => None,
    })
}

/// A text part of an outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

/// The user turn carried by a run request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub parts: Vec<TextPart>,
    pub role: String,
}

impl NewMessage {
    /// A single-part user message
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            parts: vec![TextPart { text: text.into() }],
            role: "user".to_string(),
        }
    }
}

/// Body of `POST /run_sse`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
    pub new_message: NewMessage,
    #[serde(default)]
    pub streaming: bool,
}

/// Normalized session returned by the session route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub user_id: String,
    pub app_name: String,
    #[serde(default)]
    pub events: Vec<Value>,
    #[serde(default = "empty_object")]
    pub state: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

/// A tool invocation inside an event part
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default)]
    pub args: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
}

/// A tool result inside an event part
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FunctionResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
}

/// One element of `content.parts`
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPart {
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub function_call: Option<FunctionCall>,
    #[serde(default, deserialize_with = "lenient")]
    pub function_response: Option<FunctionResponse>,
}

impl EventPart {
    /// The text of this part when it is a non-empty string
    pub fn text(&self) -> Option<&str> {
        self.text
            .as_ref()
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct EventContent {
    #[serde(default, deserialize_with = "lenient_list")]
    pub parts: Option<Vec<EventPart>>,
}

/// `actions.stateDelta`; only the keys the relay reads
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct StateDelta {
    #[serde(default)]
    pub final_report_with_citations: Option<Value>,
    #[serde(default)]
    pub url_to_short_id: Option<Value>,
    #[serde(default)]
    pub sources: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventActions {
    #[serde(default, deserialize_with = "lenient")]
    pub state_delta: Option<StateDelta>,
}

/// One SSE event payload produced by the ADK server
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct AdkEvent {
    #[serde(default, deserialize_with = "lenient")]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<EventContent>,
    #[serde(default, deserialize_with = "lenient")]
    pub actions: Option<EventActions>,
}

impl AdkEvent {
    /// `content.parts`, or nothing
    pub fn parts(&self) -> &[EventPart] {
        self.content
            .as_ref()
            .and_then(|c| c.parts.as_deref())
            .unwrap_or(&[])
    }

    /// `actions.stateDelta`, if any
    pub fn state_delta(&self) -> Option<&StateDelta> {
        self.actions.as_ref().and_then(|a| a.state_delta.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_run_request_wire_shape() {
        let req = RunRequest {
            app_name: "app".into(),
            user_id: "u_999".into(),
            session_id: "s-1".into(),
            new_message: NewMessage::user("hello"),
            streaming: false,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            json!({
                "appName": "app",
                "userId": "u_999",
                "sessionId": "s-1",
                "newMessage": {"parts": [{"text": "hello"}], "role": "user"},
                "streaming": false
            })
        );
    }

    #[test]
    fn test_session_info_defaults() {
        let info: SessionInfo =
            serde_json::from_value(json!({"id": "s", "userId": "u", "appName": "app"})).unwrap();
        assert!(info.events.is_empty());
        assert_eq!(info.state, json!({}));
    }

    #[test]
    fn test_event_tolerates_missing_and_null_fields() {
        let ev: AdkEvent = serde_json::from_value(json!({
            "author": "root_agent",
            "content": {"parts": null},
            "actions": {"stateDelta": null},
            "invocationId": "ignored"
        }))
        .unwrap();
        assert!(ev.parts().is_empty());
        assert!(ev.state_delta().is_none());
    }

    #[test]
    fn test_part_text_requires_non_empty_string() {
        let part: EventPart = serde_json::from_value(json!({"text": ""})).unwrap();
        assert_eq!(part.text(), None);
        let part: EventPart = serde_json::from_value(json!({"text": 3})).unwrap();
        assert_eq!(part.text(), None);
        let part: EventPart = serde_json::from_value(json!({"text": "hi"})).unwrap();
        assert_eq!(part.text(), Some("hi"));
    }
}
