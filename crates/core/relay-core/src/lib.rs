//! Relay Core
//!
//! Shared pieces of the Relay chat front-end for ADK agent servers:
//!
//! - SSE framing of the agent's run stream
//! - Event classification and chat state reduction
//! - Backend readiness probing and retry with backoff
//! - The chat client controller and its presentation model
//! - Configuration, error types and logging shared by the adaptors
//!
//! # Example
//!
//! ```no_run
//! use relay_core::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = RelayConfig::from_env();
//!     let backend = HttpBackend::new(config.proxy_url.clone(), config.client_token.clone());
//!     let mut chat = ChatController::new(backend, SystemClock::new());
//!     if chat.connect().await == Readiness::Ready {
//!         chat.send_message("What is new in Rust?", |_| {}).await?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub use uuid::Uuid;

pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod reducer;
pub mod resilience;
pub mod streaming;
pub mod types;
pub mod utils;
pub mod view;

pub use classifier::{classify, Author, EventSummary};
pub use client::{Backend, ByteStream, ChatController, HttpBackend, SEND_ERROR_PREFIX};
pub use config::{
    get_env_bool, get_env_int, get_env_list, get_env_or, load_env, load_env_from_path,
    RelayConfig, DEFAULT_ADK_BASE_URL, DEFAULT_PROXY_URL,
};
pub use error::{ErrorKind, RelayError, Result};
pub use reducer::{ChatState, Mutation, StreamReducer};
pub use resilience::{
    retry_with_backoff, Clock, ManualClock, ProbeOutcome, Readiness, ReadinessMonitor,
    RetryPolicy, SystemClock,
};
pub use streaming::{decode_stream, SseDecoder};
pub use types::*;
pub use utils::{init_logging, subscribe_logs, LogEvent};
pub use view::{
    format_event_data, header_subtitle, is_code_block, CollapseState, ConversationView,
    EventBody, EventIcon, MessageView, PendingIndicator, TimelineEntryView, TimelineView,
};
