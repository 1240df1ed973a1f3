//! Presentation model for a conversation
//!
//! Front-ends render a [`ConversationView`] instead of reading [`ChatState`]
//! directly; every visibility rule lives here.

use crate::reducer::ChatState;
use crate::types::{EventData, Message, MessageKind, ProcessedEvent};
use serde_json::Value;
use std::collections::HashSet;

pub const APP_TITLE: &str = "ADK Research Assistant";
pub const APP_TAGLINE: &str = "Powered by Google ADK with research capabilities";
pub const WELCOME_TITLE: &str = "Welcome to ADK Research Assistant";
pub const WELCOME_BODY: &str =
    "Ask me anything and I'll research it for you using web search and AI agents.";
pub const INPUT_PLACEHOLDER: &str = "Ask me to research something...";
pub const CONNECTING_TEXT: &str = "Connecting to ADK backend...";
pub const UNAVAILABLE_TITLE: &str = "ADK Backend Unavailable";
pub const UNAVAILABLE_BODY: &str = "Please ensure the ADK FastAPI server is running on localhost:8000";

/// Header subtitle, with the website count once anything was searched
pub fn header_subtitle(website_count: usize) -> String {
    if website_count > 0 {
        format!("{} • Searched {} websites", APP_TAGLINE, website_count)
    } else {
        APP_TAGLINE.to_string()
    }
}

/// Icon of a timeline entry, chosen from keywords in its title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventIcon {
    FunctionCall,
    FunctionResponse,
    Search,
    Thinking,
    Writing,
    Source,
    Activity,
}

impl EventIcon {
    pub fn for_title(title: &str) -> Self {
        let title = title.to_lowercase();
        let has = |needle: &str| title.contains(needle);
        if has("function call") {
            EventIcon::FunctionCall
        } else if has("function response") {
            EventIcon::FunctionResponse
        } else if has("search") || has("research") {
            EventIcon::Search
        } else if has("thinking") || has("planning") {
            EventIcon::Thinking
        } else if has("writing") || has("composing") {
            EventIcon::Writing
        } else if has("source") || has("link") {
            EventIcon::Source
        } else {
            EventIcon::Activity
        }
    }

    /// Single-cell symbol for text front-ends
    pub fn glyph(&self) -> &'static str {
        match self {
            EventIcon::FunctionCall => "→",
            EventIcon::FunctionResponse => "←",
            EventIcon::Search => "🔍",
            EventIcon::Thinking => "💭",
            EventIcon::Writing => "✎",
            EventIcon::Source => "🔗",
            EventIcon::Activity => "•",
        }
    }
}

fn pretty(value: Option<&Value>) -> String {
    match value {
        Some(v) => serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()),
        None => "null".to_string(),
    }
}

/// Human-readable body of a timeline entry
pub fn format_event_data(data: &EventData) -> String {
    match data {
        EventData::FunctionCall { name, args, .. } => format!(
            "Calling function: {}\nArguments: {}",
            name.as_deref().unwrap_or("unknown"),
            pretty(args.as_ref())
        ),
        EventData::FunctionResponse { name, response, .. } => format!(
            "Function {} response:\n{}",
            name.as_deref().unwrap_or("unknown"),
            pretty(response.as_ref())
        ),
        EventData::Text { content } => content.clone(),
        EventData::Sources { content } => {
            if content.is_empty() {
                return "No sources found.".to_string();
            }
            content
                .values()
                .map(|source| {
                    let title = source
                        .get("title")
                        .and_then(Value::as_str)
                        .filter(|t| !t.is_empty())
                        .unwrap_or("Untitled Source");
                    let url = source.get("url").and_then(Value::as_str).unwrap_or("");
                    format!("[{}]({})", title, url)
                })
                .collect::<Vec<_>>()
                .join(", ")
        }
        EventData::Raw { content } => pretty(Some(content)),
    }
}

/// Whether the body is shown verbatim as code rather than as markdown
pub fn is_code_block(data: &EventData) -> bool {
    matches!(
        data,
        EventData::FunctionCall { .. } | EventData::FunctionResponse { .. }
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventBody {
    Code(String),
    Markdown(String),
}

impl EventBody {
    pub fn text(&self) -> &str {
        match self {
            EventBody::Code(text) | EventBody::Markdown(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineEntryView {
    pub title: String,
    pub icon: EventIcon,
    pub body: EventBody,
}

impl TimelineEntryView {
    pub fn from_event(event: &ProcessedEvent) -> Self {
        let text = format_event_data(&event.data);
        Self {
            title: event.title.clone(),
            icon: EventIcon::for_title(&event.title),
            body: if is_code_block(&event.data) {
                EventBody::Code(text)
            } else {
                EventBody::Markdown(text)
            },
        }
    }
}

/// In-flight marker at the edge of a timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingIndicator {
    /// Loading, nothing received yet
    Thinking,
    /// Loading, some entries already shown
    Processing,
}

impl PendingIndicator {
    pub fn label(&self) -> &'static str {
        match self {
            PendingIndicator::Thinking => "Thinking...",
            PendingIndicator::Processing => "Processing...",
        }
    }
}

/// The "Research" panel above an AI message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelineView {
    pub entries: Vec<TimelineEntryView>,
    /// Badge count; 0 hides the badge
    pub website_count: usize,
    pub pending: Option<PendingIndicator>,
    pub collapsed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageView {
    Human {
        id: String,
        content: String,
    },
    Ai {
        id: String,
        timeline: Option<TimelineView>,
        /// `None` while the content is blank
        content: Option<String>,
        /// Shown under the content only
        agent: Option<String>,
    },
}

impl MessageView {
    pub fn id(&self) -> &str {
        match self {
            MessageView::Human { id, .. } | MessageView::Ai { id, .. } => id,
        }
    }
}

/// Which timelines the user folded away
#[derive(Debug, Clone, Default)]
pub struct CollapseState {
    collapsed: HashSet<String>,
}

impl CollapseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip one message's timeline; returns the new collapsed flag
    pub fn toggle(&mut self, message_id: &str) -> bool {
        if self.collapsed.remove(message_id) {
            false
        } else {
            self.collapsed.insert(message_id.to_string());
            true
        }
    }

    pub fn is_collapsed(&self, message_id: &str) -> bool {
        self.collapsed.contains(message_id)
    }
}

/// Everything a front-end needs to draw one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationView {
    pub title: &'static str,
    pub subtitle: String,
    /// Show the welcome banner instead of messages
    pub welcome: bool,
    pub messages: Vec<MessageView>,
    /// Loading and the last message is still the user's
    pub thinking: bool,
}

impl ConversationView {
    pub fn build(state: &ChatState, loading: bool) -> Self {
        Self::build_with(state, loading, &CollapseState::default())
    }

    pub fn build_with(state: &ChatState, loading: bool, collapse: &CollapseState) -> Self {
        let messages = state.messages();
        let last_ai = state.last_ai_message_id();

        let views = messages
            .iter()
            .map(|message| match message.kind {
                MessageKind::Human => MessageView::Human {
                    id: message.id.clone(),
                    content: message.content.clone(),
                },
                MessageKind::Ai => {
                    let is_last = last_ai == Some(message.id.as_str());
                    ai_view(state, message, loading && is_last, is_last, collapse)
                }
            })
            .collect();

        Self {
            title: APP_TITLE,
            subtitle: header_subtitle(state.website_count()),
            welcome: messages.is_empty(),
            messages: views,
            thinking: loading && matches!(messages.last(), Some(m) if m.kind == MessageKind::Human),
        }
    }
}

fn ai_view(
    state: &ChatState,
    message: &Message,
    loading: bool,
    is_last: bool,
    collapse: &CollapseState,
) -> MessageView {
    let events = state.events_for(&message.id);

    let timeline = (!events.is_empty() || loading).then(|| TimelineView {
        entries: events.iter().map(TimelineEntryView::from_event).collect(),
        website_count: if is_last { state.website_count() } else { 0 },
        pending: match (loading, events.is_empty()) {
            (false, _) => None,
            (true, true) => Some(PendingIndicator::Thinking),
            (true, false) => Some(PendingIndicator::Processing),
        },
        collapsed: collapse.is_collapsed(&message.id),
    });

    let content = Some(message.content.clone()).filter(|c| !c.trim().is_empty());
    let agent = content
        .as_ref()
        .and(message.agent_name())
        .map(str::to_string);

    MessageView::Ai {
        id: message.id.clone(),
        timeline,
        content,
        agent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reducer::Mutation;
    use serde_json::json;

    fn event(title: &str, data: EventData) -> Mutation {
        Mutation::AppendEvent {
            message_id: "ai-1".into(),
            event: ProcessedEvent::new(title, data),
        }
    }

    #[test]
    fn test_empty_conversation_shows_welcome() {
        let view = ConversationView::build(&ChatState::new(), false);
        assert!(view.welcome);
        assert!(view.messages.is_empty());
        assert_eq!(view.subtitle, APP_TAGLINE);
    }

    #[test]
    fn test_loading_placeholder_shows_thinking_timeline() {
        let mut state = ChatState::new();
        state.push_message(Message::human("h-1", "q"));
        state.push_message(Message::ai_placeholder("ai-1"));

        let view = ConversationView::build(&state, true);
        assert!(!view.thinking);
        match &view.messages[1] {
            MessageView::Ai {
                timeline, content, agent, ..
            } => {
                let timeline = timeline.as_ref().unwrap();
                assert_eq!(timeline.pending, Some(PendingIndicator::Thinking));
                assert!(content.is_none());
                assert!(agent.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }

        let idle = ConversationView::build(&state, false);
        assert!(matches!(&idle.messages[1], MessageView::Ai { timeline: None, .. }));
    }

    #[test]
    fn test_badge_only_on_last_ai_message() {
        let mut state = ChatState::new();
        state.push_message(Message::ai("ai-1", "first", None));
        state.apply(&event("Initial Web Research", EventData::Text { content: "x".into() }));
        state.apply(&Mutation::SourceCount(4));
        state.push_message(Message::ai(
            "ai-2",
            "second",
            Some("report_composer_with_citations".into()),
        ));

        let view = ConversationView::build(&state, false);
        assert_eq!(view.subtitle, format!("{} • Searched 4 websites", APP_TAGLINE));
        match &view.messages[0] {
            MessageView::Ai { timeline: Some(t), .. } => {
                assert_eq!(t.website_count, 0);
                assert_eq!(t.pending, None);
                assert_eq!(t.entries[0].icon, EventIcon::Search);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &view.messages[1] {
            MessageView::Ai { timeline, agent, .. } => {
                assert!(timeline.is_none());
                assert_eq!(agent.as_deref(), Some("report_composer_with_citations"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_thinking_when_last_message_is_human() {
        let mut state = ChatState::new();
        state.push_message(Message::human("h-1", "q"));
        assert!(ConversationView::build(&state, true).thinking);
        assert!(!ConversationView::build(&state, false).thinking);
    }

    #[test]
    fn test_collapse_toggle() {
        let mut state = ChatState::new();
        state.push_message(Message::ai_placeholder("ai-1"));
        state.apply(&event("Planning Research Strategy", EventData::Text { content: "p".into() }));

        let mut collapse = CollapseState::new();
        assert!(collapse.toggle("ai-1"));
        let view = ConversationView::build_with(&state, true, &collapse);
        match &view.messages[0] {
            MessageView::Ai { timeline: Some(t), .. } => {
                assert!(t.collapsed);
                assert_eq!(t.pending, Some(PendingIndicator::Processing));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(!collapse.toggle("ai-1"));
    }

    #[test]
    fn test_format_function_call_and_response() {
        let call = EventData::FunctionCall {
            name: Some("google_search".into()),
            args: Some(json!({"q": "rust"})),
            id: None,
        };
        assert_eq!(
            format_event_data(&call),
            "Calling function: google_search\nArguments: {\n  \"q\": \"rust\"\n}"
        );
        assert!(is_code_block(&call));

        let response = EventData::FunctionResponse {
            name: Some("google_search".into()),
            response: Some(json!([1])),
            id: None,
        };
        assert_eq!(
            format_event_data(&response),
            "Function google_search response:\n[\n  1\n]"
        );
    }

    #[test]
    fn test_format_sources() {
        let map = json!({
            "a": {"title": "Rust", "url": "https://rust-lang.org"},
            "b": {"url": "https://docs.rs"}
        });
        let data = EventData::Sources {
            content: map.as_object().unwrap().clone(),
        };
        assert_eq!(
            format_event_data(&data),
            "[Rust](https://rust-lang.org), [Untitled Source](https://docs.rs)"
        );
        assert!(!is_code_block(&data));

        let empty = EventData::Sources {
            content: Default::default(),
        };
        assert_eq!(format_event_data(&empty), "No sources found.");
    }

    #[test]
    fn test_icons_from_title() {
        assert_eq!(EventIcon::for_title("Function Call: x"), EventIcon::FunctionCall);
        assert_eq!(EventIcon::for_title("Function Response: x"), EventIcon::FunctionResponse);
        assert_eq!(EventIcon::for_title("Enhanced Web Research"), EventIcon::Search);
        assert_eq!(EventIcon::for_title("Interactive Planning"), EventIcon::Thinking);
        assert_eq!(EventIcon::for_title("Retrieved Sources"), EventIcon::Source);
        assert_eq!(EventIcon::for_title("Quality Assessment"), EventIcon::Activity);
    }
}
