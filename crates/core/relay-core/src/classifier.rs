//! Event classification
//!
//! Reads one dispatched SSE payload and extracts, independently, everything
//! the reducer may act on. Classification never fails: a payload that is not
//! valid JSON (or not an ADK event) yields an empty summary.

use crate::types::{AdkEvent, FunctionCall, FunctionResponse};
use serde_json::Value;
use tracing::{debug, warn};

/// Upstream processing roles whose identity changes how output is shown
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Author {
    InteractivePlanner,
    RootAgent,
    PlanGenerator,
    SectionPlanner,
    SectionResearcher,
    ResearchEvaluator,
    EscalationChecker,
    EnhancedSearchExecutor,
    ResearchPipeline,
    IterativeRefinementLoop,
    ReportComposer,
    /// Any other named role
    Other(String),
    /// No author on the event
    Unknown,
}

impl Author {
    /// Map the `author` field of an event onto a role
    pub fn parse(name: &str) -> Self {
        match name {
            "" => Author::Unknown,
            "interactive_planner_agent" => Author::InteractivePlanner,
            "root_agent" => Author::RootAgent,
            "plan_generator" => Author::PlanGenerator,
            "section_planner" => Author::SectionPlanner,
            "section_researcher" => Author::SectionResearcher,
            "research_evaluator" => Author::ResearchEvaluator,
            "EscalationChecker" => Author::EscalationChecker,
            "enhanced_search_executor" => Author::EnhancedSearchExecutor,
            "research_pipeline" => Author::ResearchPipeline,
            "iterative_refinement_loop" => Author::IterativeRefinementLoop,
            "report_composer_with_citations" => Author::ReportComposer,
            other => Author::Other(other.to_string()),
        }
    }

    /// Wire name of the role (empty for [`Author::Unknown`])
    pub fn name(&self) -> &str {
        match self {
            Author::InteractivePlanner => "interactive_planner_agent",
            Author::RootAgent => "root_agent",
            Author::PlanGenerator => "plan_generator",
            Author::SectionPlanner => "section_planner",
            Author::SectionResearcher => "section_researcher",
            Author::ResearchEvaluator => "research_evaluator",
            Author::EscalationChecker => "EscalationChecker",
            Author::EnhancedSearchExecutor => "enhanced_search_executor",
            Author::ResearchPipeline => "research_pipeline",
            Author::IterativeRefinementLoop => "iterative_refinement_loop",
            Author::ReportComposer => "report_composer_with_citations",
            Author::Other(name) => name,
            Author::Unknown => "",
        }
    }

    /// Timeline title for text emitted by this role
    pub fn label(&self) -> String {
        match self {
            Author::PlanGenerator => "Planning Research Strategy".to_string(),
            Author::SectionPlanner => "Structuring Report Outline".to_string(),
            Author::SectionResearcher => "Initial Web Research".to_string(),
            Author::ResearchEvaluator => "Evaluating Research Quality".to_string(),
            Author::EscalationChecker => "Quality Assessment".to_string(),
            Author::EnhancedSearchExecutor => "Enhanced Web Research".to_string(),
            Author::ResearchPipeline => "Executing Research Pipeline".to_string(),
            Author::IterativeRefinementLoop => "Refining Research".to_string(),
            Author::InteractivePlanner | Author::RootAgent => "Interactive Planning".to_string(),
            Author::Unknown => "Processing (Unknown Agent)".to_string(),
            Author::ReportComposer | Author::Other(_) => format!("Processing ({})", self.name()),
        }
    }

    /// Roles whose `url_to_short_id` map counts toward the website total
    pub fn is_researcher(&self) -> bool {
        matches!(self, Author::SectionResearcher | Author::EnhancedSearchExecutor)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Author::Unknown)
    }
}

/// Everything the reducer may act on, extracted from one event
#[derive(Debug, Clone, PartialEq)]
pub struct EventSummary {
    pub author: Author,
    /// Non-empty text parts, in order
    pub text_parts: Vec<String>,
    /// First function call part only
    pub function_call: Option<FunctionCall>,
    /// First function response part only
    pub function_response: Option<FunctionResponse>,
    /// Distinct websites reported by a research role (0 if none)
    pub source_count: usize,
    pub sources: Option<Value>,
    pub final_report: Option<String>,
}

impl EventSummary {
    /// The inert result of an unparsable payload
    pub fn empty() -> Self {
        Self {
            author: Author::Unknown,
            text_parts: Vec::new(),
            function_call: None,
            function_response: None,
            source_count: 0,
            sources: None,
            final_report: None,
        }
    }

    /// True when the reducer has nothing to do with this event
    pub fn is_empty(&self) -> bool {
        self.text_parts.is_empty()
            && self.function_call.is_none()
            && self.function_response.is_none()
            && self.source_count == 0
            && self.sources.is_none()
            && self.final_report.is_none()
            && !self.author.is_known()
    }

    /// Summarize an already-deserialized event
    pub fn from_event(event: &AdkEvent) -> Self {
        let author = Author::parse(event.author.as_deref().unwrap_or(""));
        let parts = event.parts();

        let text_parts = parts
            .iter()
            .filter_map(|p| p.text())
            .map(|t| t.to_string())
            .collect();
        let function_call = parts.iter().find_map(|p| p.function_call.clone());
        let function_response = parts.iter().find_map(|p| p.function_response.clone());

        let delta = event.state_delta();
        let source_count = if author.is_researcher() {
            delta
                .and_then(|d| d.url_to_short_id.as_ref())
                .and_then(Value::as_object)
                .map(|m| m.len())
                .unwrap_or(0)
        } else {
            0
        };
        let sources = delta
            .and_then(|d| d.sources.clone())
            .filter(|s| !s.is_null());
        let final_report = delta
            .and_then(|d| d.final_report_with_citations.as_ref())
            .and_then(Value::as_str)
            .filter(|r| !r.is_empty())
            .map(|r| r.to_string());

        Self {
            author,
            text_parts,
            function_call,
            function_response,
            source_count,
            sources,
            final_report,
        }
    }
}

/// Classify one dispatched SSE payload
///
/// Only payloads that are not a JSON object are dropped; inside an object,
/// each field that has an unexpected shape is skipped on its own.
pub fn classify(payload: &str) -> EventSummary {
    let event = match serde_json::from_str::<Value>(payload) {
        Ok(value @ Value::Object(_)) => serde_json::from_value::<AdkEvent>(value),
        Ok(_) => {
            warn!("Dropping non-object SSE payload: {}", preview(payload));
            return EventSummary::empty();
        }
        Err(e) => Err(e),
    };

    match event {
        Ok(event) => {
            let summary = EventSummary::from_event(&event);
            debug!(
                "SSE event author={} texts={} call={} response={} sources={}",
                summary.author.name(),
                summary.text_parts.len(),
                summary.function_call.is_some(),
                summary.function_response.is_some(),
                summary.source_count
            );
            summary
        }
        Err(e) => {
            warn!("Dropping malformed SSE payload ({}): {}", e, preview(payload));
            EventSummary::empty()
        }
    }
}

fn preview(payload: &str) -> String {
    payload.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_malformed_payload_is_empty() {
        assert!(classify("not json").is_empty());
        assert!(classify("").is_empty());
        assert!(classify("[1,2]").is_empty());
    }

    #[test]
    fn test_ill_shaped_part_keeps_siblings() {
        let summary =
            classify(r#"{"author":"plan_generator","content":{"parts":[{"text":"step one"},"oops"]}}"#);
        assert_eq!(summary.author, Author::PlanGenerator);
        assert_eq!(summary.text_parts, vec!["step one".to_string()]);
    }

    #[test]
    fn test_ill_typed_call_id_keeps_text_and_call() {
        let payload = json!({
            "author": "interactive_planner_agent",
            "content": {"parts": [
                {"text": "Hello"},
                {"functionCall": {"name": "google_search", "args": {"q": "a"}, "id": 7}}
            ]},
            "actions": {"stateDelta": "not an object"}
        });
        let summary = classify(&payload.to_string());
        assert_eq!(summary.text_parts, vec!["Hello".to_string()]);
        let call = summary.function_call.unwrap();
        assert_eq!(call.name.as_deref(), Some("google_search"));
        assert_eq!(call.id, None);
        assert!(summary.sources.is_none());
    }

    #[test]
    fn test_ill_typed_author_reads_as_unknown() {
        let summary = classify(r#"{"author":5,"content":{"parts":[{"text":"x"}]}}"#);
        assert_eq!(summary.author, Author::Unknown);
        assert_eq!(summary.text_parts, vec!["x".to_string()]);
    }

    #[test]
    fn test_first_function_call_only() {
        let payload = json!({
            "author": "section_researcher",
            "content": {"parts": [
                {"functionCall": {"name": "google_search", "args": {"q": "a"}, "id": "1"}},
                {"functionCall": {"name": "google_search", "args": {"q": "b"}, "id": "2"}},
                {"functionResponse": {"name": "google_search", "response": {"ok": true}, "id": "1"}},
                {"functionResponse": {"name": "google_search", "response": {"ok": false}, "id": "2"}}
            ]}
        });
        let summary = classify(&payload.to_string());
        assert_eq!(summary.function_call.unwrap().id.as_deref(), Some("1"));
        assert_eq!(summary.function_response.unwrap().id.as_deref(), Some("1"));
        assert!(summary.text_parts.is_empty());
    }

    #[test]
    fn test_source_count_only_for_research_roles() {
        let delta = json!({"stateDelta": {"url_to_short_id": {"a": 1, "b": 2, "c": 3}}});
        let researcher = json!({"author": "enhanced_search_executor", "actions": delta});
        let planner = json!({"author": "plan_generator", "actions": delta});
        assert_eq!(classify(&researcher.to_string()).source_count, 3);
        assert_eq!(classify(&planner.to_string()).source_count, 0);
    }

    #[test]
    fn test_state_delta_fields() {
        let payload = json!({
            "author": "report_composer_with_citations",
            "actions": {"stateDelta": {
                "final_report_with_citations": "# Report",
                "sources": {"src-1": {"title": "Rust", "url": "https://rust-lang.org"}}
            }}
        });
        let summary = classify(&payload.to_string());
        assert_eq!(summary.author, Author::ReportComposer);
        assert_eq!(summary.final_report.as_deref(), Some("# Report"));
        assert!(summary.sources.unwrap().get("src-1").is_some());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Author::parse("section_researcher").label(), "Initial Web Research");
        assert_eq!(Author::parse("root_agent").label(), "Interactive Planning");
        assert_eq!(Author::parse("mystery").label(), "Processing (mystery)");
        assert_eq!(Author::parse("").label(), "Processing (Unknown Agent)");
        assert_eq!(
            Author::parse("report_composer_with_citations").label(),
            "Processing (report_composer_with_citations)"
        );
    }

    #[test]
    fn test_author_round_trips_through_name() {
        for name in ["EscalationChecker", "research_pipeline", "custom_agent"] {
            assert_eq!(Author::parse(name).name(), name);
        }
    }
}
