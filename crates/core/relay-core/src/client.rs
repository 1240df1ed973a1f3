//! Chat client
//!
//! [`Backend`] is the seam to the relay's proxy routes; [`HttpBackend`] talks
//! to them over HTTP. [`ChatController`] owns one conversation: it waits for
//! the backend, creates the session, sends messages and folds the streamed
//! events into a [`ChatState`].

use crate::classifier::classify;
use crate::reducer::{ChatState, StreamReducer};
use crate::resilience::{retry_with_backoff, Clock, Readiness, ReadinessMonitor, RetryPolicy};
use crate::streaming::decode_stream;
use crate::types::{ChatSession, Message, NewMessage, RunRequest, SessionInfo};
use crate::{RelayError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Raw response body of a run request
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Prefix of the text shown in place of a failed response
pub const SEND_ERROR_PREFIX: &str = "Sorry, there was an error processing your request: ";

/// Operations the chat client needs from the relay
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Backend: Send + Sync {
    /// True when the backend answered the health probe successfully
    async fn check_health(&self) -> bool;

    /// Create a session with a client-chosen id
    async fn create_session(&self, session_id: &str) -> Result<SessionInfo>;

    /// Start a run; resolves once the response headers arrived
    async fn run(&self, request: &RunRequest) -> Result<ByteStream>;
}

/// [`Backend`] over the relay's `/api/adk/*` routes
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url, token)
    }

    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn check_health(&self) -> bool {
        match self
            .request(reqwest::Method::GET, "/api/adk/health")
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!("Backend not ready yet: {}", e);
                false
            }
        }
    }

    async fn create_session(&self, session_id: &str) -> Result<SessionInfo> {
        let resp = self
            .request(reqwest::Method::POST, "/api/adk/session")
            .json(&serde_json::json!({ "sessionId": session_id }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RelayError::upstream(format!(
                "Failed to create session: {}",
                status
            )));
        }
        Ok(resp.json::<SessionInfo>().await?)
    }

    async fn run(&self, request: &RunRequest) -> Result<ByteStream> {
        let resp = self
            .request(reqwest::Method::POST, "/api/adk/chat")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RelayError::upstream(format!(
                "Failed to send message: {}",
                status
            )));
        }
        Ok(resp
            .bytes_stream()
            .map(|chunk| chunk.map_err(RelayError::from))
            .boxed())
    }
}

/// One conversation against a [`Backend`]
pub struct ChatController<B, C> {
    backend: B,
    clock: C,
    policy: RetryPolicy,
    monitor: ReadinessMonitor,
    session: Option<ChatSession>,
    session_attempted: bool,
    state: ChatState,
    loading: bool,
}

impl<B: Backend, C: Clock> ChatController<B, C> {
    pub fn new(backend: B, clock: C) -> Self {
        Self {
            backend,
            clock,
            policy: RetryPolicy::default(),
            monitor: ReadinessMonitor::default(),
            session: None,
            session_attempted: false,
            state: ChatState::new(),
            loading: false,
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_readiness_monitor(mut self, monitor: ReadinessMonitor) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    pub fn readiness(&self) -> Readiness {
        self.monitor.state()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Sending needs a session and no response in flight
    pub fn can_send(&self) -> bool {
        self.session.is_some() && !self.loading
    }

    /// Wait for the backend, then create the session (once)
    pub async fn connect(&mut self) -> Readiness {
        let backend = &self.backend;
        let readiness = self
            .monitor
            .wait_until_ready(&self.clock, || backend.check_health())
            .await;

        if readiness == Readiness::Ready && !self.session_attempted {
            self.session_attempted = true;
            let session_id = Uuid::new_v4().to_string();
            let created = retry_with_backoff(&self.clock, &self.policy, || {
                backend.create_session(&session_id)
            })
            .await;

            match created {
                Ok(info) => {
                    info!("Session created: {} (app {})", info.id, info.app_name);
                    self.session = Some(ChatSession {
                        session_id: info.id,
                        user_id: info.user_id,
                        app_name: info.app_name,
                    });
                }
                Err(e) => error!("Failed to create session after retries: {}", e),
            }
        }

        readiness
    }

    /// Send one user message and stream the response into the state
    ///
    /// `on_update` sees the state after the message pair is added, after
    /// every applied mutation and once more when the response is complete.
    /// Blank queries and calls without a session are ignored. On failure the
    /// error is shown in the placeholder, or in a message of its own when
    /// text had already streamed in, and the error is returned.
    pub async fn send_message<F>(&mut self, query: &str, mut on_update: F) -> Result<()>
    where
        F: FnMut(&ChatState) + Send,
    {
        let trimmed = query.trim();
        if trimmed.is_empty() || self.loading {
            return Ok(());
        }
        let session = match &self.session {
            Some(session) => session.clone(),
            None => {
                warn!("Ignoring message: no session");
                return Ok(());
            }
        };

        let ai_message_id = Uuid::new_v4().to_string();
        self.state
            .push_message(Message::human(Uuid::new_v4().to_string(), trimmed));
        self.state
            .push_message(Message::ai_placeholder(ai_message_id.clone()));
        self.loading = true;
        on_update(&self.state);

        let request = RunRequest {
            app_name: session.app_name,
            user_id: session.user_id,
            session_id: session.session_id,
            new_message: NewMessage::user(query),
            streaming: false,
        };
        let mut reducer = StreamReducer::new(ai_message_id.clone());
        let result = self.stream_response(&request, &mut reducer, &mut on_update).await;

        self.loading = false;
        if let Err(e) = &result {
            error!("Error processing message: {}", e);
            let text = format!("{}{}", SEND_ERROR_PREFIX, e);
            let partial = self
                .state
                .message(&ai_message_id)
                .is_some_and(|m| !m.content.trim().is_empty());
            if partial {
                self.state.push_message(Message::ai(
                    format!("{}_error", ai_message_id),
                    text,
                    None,
                ));
            } else {
                self.state.set_message_content(&ai_message_id, text);
            }
        }
        on_update(&self.state);
        result
    }

    async fn stream_response<F>(
        &mut self,
        request: &RunRequest,
        reducer: &mut StreamReducer,
        on_update: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&ChatState) + Send,
    {
        let backend = &self.backend;
        let body = retry_with_backoff(&self.clock, &self.policy, || backend.run(request)).await?;

        let mut payloads = Box::pin(decode_stream(body));
        let mut count = 0usize;
        while let Some(payload) = payloads.next().await {
            let payload = payload?;
            count += 1;
            for mutation in reducer.reduce(&classify(&payload)) {
                self.state.apply(&mutation);
                on_update(&self.state);
            }
        }
        debug!("Stream for {} finished after {} events", reducer.ai_message_id(), count);
        Ok(())
    }
}
