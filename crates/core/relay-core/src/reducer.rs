//! Chat state reduction
//!
//! A [`StreamReducer`] turns classified events of one in-flight response into
//! [`Mutation`]s; [`ChatState::apply`] commits them. Keeping the two apart
//! lets callers observe every individual state transition.
//!
//! `ChatState` stores its projections behind `Arc`s and mutates through
//! `Arc::make_mut`, so a [`ChatState::snapshot`] taken earlier never changes.

use crate::classifier::{classify, Author, EventSummary};
use crate::types::{EventData, Message, ProcessedEvent};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One atomic change to [`ChatState`]
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Raise the session-wide website count to at least this value
    SourceCount(usize),
    /// Append a timeline entry to a message
    AppendEvent {
        message_id: String,
        event: ProcessedEvent,
    },
    /// Rewrite the displayed content of the in-flight placeholder
    UpdatePlaceholder {
        message_id: String,
        content: String,
        /// New attribution; `None` keeps the current one
        agent: Option<String>,
    },
    /// Add a new, separate message (final reports)
    AppendMessage(Message),
}

/// Per-response reduction state
///
/// Holds the accumulated planner text and the most recent author for one AI
/// placeholder. Create a fresh reducer for every message sent.
#[derive(Debug, Clone)]
pub struct StreamReducer {
    ai_message_id: String,
    accumulated_text: String,
    current_agent: String,
    final_reports: usize,
}

impl StreamReducer {
    pub fn new(ai_message_id: impl Into<String>) -> Self {
        Self {
            ai_message_id: ai_message_id.into(),
            accumulated_text: String::new(),
            current_agent: String::new(),
            final_reports: 0,
        }
    }

    pub fn ai_message_id(&self) -> &str {
        &self.ai_message_id
    }

    /// Most recent non-empty author seen on this stream
    pub fn current_agent(&self) -> Option<&str> {
        Some(self.current_agent.as_str()).filter(|a| !a.is_empty())
    }

    /// Derive the mutations for one event, in dispatch order
    pub fn reduce(&mut self, summary: &EventSummary) -> Vec<Mutation> {
        let mut mutations = Vec::new();

        if summary.source_count > 0 {
            mutations.push(Mutation::SourceCount(summary.source_count));
        }

        if summary.author.is_known() {
            self.current_agent = summary.author.name().to_string();
        }

        if let Some(call) = &summary.function_call {
            mutations.push(self.timeline(
                format!("Function Call: {}", call.name.as_deref().unwrap_or("unknown")),
                EventData::FunctionCall {
                    name: call.name.clone(),
                    args: call.args.clone(),
                    id: call.id.clone(),
                },
            ));
        }

        if let Some(response) = &summary.function_response {
            mutations.push(self.timeline(
                format!(
                    "Function Response: {}",
                    response.name.as_deref().unwrap_or("unknown")
                ),
                EventData::FunctionResponse {
                    name: response.name.clone(),
                    response: response.response.clone(),
                    id: response.id.clone(),
                },
            ));
        }

        if !summary.text_parts.is_empty() && summary.author != Author::ReportComposer {
            if summary.author == Author::InteractivePlanner {
                for text in &summary.text_parts {
                    let fragment = text.trim();
                    if !fragment.is_empty() {
                        if !self.accumulated_text.is_empty() {
                            self.accumulated_text.push(' ');
                        }
                        self.accumulated_text.push_str(fragment);
                    }
                    mutations.push(Mutation::UpdatePlaceholder {
                        message_id: self.ai_message_id.clone(),
                        content: self.accumulated_text.clone(),
                        agent: self.current_agent().map(str::to_string),
                    });
                }
            } else {
                mutations.push(self.timeline(
                    summary.author.label(),
                    EventData::Text {
                        content: summary.text_parts.join(" "),
                    },
                ));
            }
        }

        if let Some(sources) = &summary.sources {
            let data = match sources {
                Value::Object(map) => EventData::Sources {
                    content: map.clone(),
                },
                other => EventData::Raw {
                    content: other.clone(),
                },
            };
            mutations.push(self.timeline("Retrieved Sources", data));
        }

        if summary.author == Author::ReportComposer {
            if let Some(report) = &summary.final_report {
                self.final_reports += 1;
                let id = format!("{}_final_{}", self.ai_message_id, self.final_reports);
                mutations.push(Mutation::AppendMessage(Message::ai(
                    id,
                    report.clone(),
                    self.current_agent().map(str::to_string),
                )));
            }
        }

        mutations
    }

    fn timeline(&self, title: impl Into<String>, data: EventData) -> Mutation {
        Mutation::AppendEvent {
            message_id: self.ai_message_id.clone(),
            event: ProcessedEvent::new(title, data),
        }
    }
}

/// Conversation state shown by the view
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    messages: Arc<Vec<Message>>,
    message_events: Arc<HashMap<String, Vec<ProcessedEvent>>>,
    website_count: usize,
}

impl ChatState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cheap immutable copy of the current state
    pub fn snapshot(&self) -> ChatState {
        self.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Timeline entries attached to a message, oldest first
    pub fn events_for(&self, message_id: &str) -> &[ProcessedEvent] {
        self.message_events
            .get(message_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Running maximum of distinct websites seen this session
    pub fn website_count(&self) -> usize {
        self.website_count
    }

    /// Id of the most recent AI message
    pub fn last_ai_message_id(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_ai())
            .map(|m| m.id.as_str())
    }

    pub fn push_message(&mut self, message: Message) {
        Arc::make_mut(&mut self.messages).push(message);
    }

    /// Replace the content of an existing message; false if no such id
    pub fn set_message_content(&mut self, message_id: &str, content: impl Into<String>) -> bool {
        match Arc::make_mut(&mut self.messages)
            .iter_mut()
            .find(|m| m.id == message_id)
        {
            Some(msg) => {
                msg.content = content.into();
                true
            }
            None => false,
        }
    }

    /// Commit one mutation
    pub fn apply(&mut self, mutation: &Mutation) {
        match mutation {
            Mutation::SourceCount(count) => {
                self.website_count = self.website_count.max(*count);
            }
            Mutation::AppendEvent { message_id, event } => {
                Arc::make_mut(&mut self.message_events)
                    .entry(message_id.clone())
                    .or_default()
                    .push(event.clone());
            }
            Mutation::UpdatePlaceholder {
                message_id,
                content,
                agent,
            } => {
                if let Some(msg) = Arc::make_mut(&mut self.messages)
                    .iter_mut()
                    .find(|m| &m.id == message_id)
                {
                    msg.content = content.clone();
                    if let Some(agent) = agent {
                        msg.agent = Some(agent.clone());
                    }
                } else {
                    debug!("Placeholder {} no longer present", message_id);
                }
            }
            Mutation::AppendMessage(message) => {
                self.push_message(message.clone());
            }
        }
    }

    /// Classify, reduce and commit one raw SSE payload
    ///
    /// Returns the mutations that were applied; empty for malformed payloads.
    pub fn apply_payload(&mut self, reducer: &mut StreamReducer, payload: &str) -> Vec<Mutation> {
        let mutations = reducer.reduce(&classify(payload));
        for mutation in &mutations {
            self.apply(mutation);
        }
        mutations
    }
}
