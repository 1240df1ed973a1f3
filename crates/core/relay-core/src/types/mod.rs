//! Core data types

pub mod adk;
pub mod events;
pub mod messages;

pub use adk::{
    AdkEvent, EventActions, EventContent, EventPart, FunctionCall, FunctionResponse, NewMessage,
    RunRequest, SessionInfo, StateDelta, TextPart,
};
pub use events::{EventData, ProcessedEvent};
pub use messages::{ChatSession, Message, MessageKind};
