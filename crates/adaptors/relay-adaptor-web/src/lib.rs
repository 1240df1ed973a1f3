//! Relay web adaptor
//!
//! An axum server standing between chat clients and an ADK agent server:
//!
//! - `GET  /api/adk/health`  probe the agent server
//! - `POST /api/adk/session` create a session
//! - `POST /api/adk/chat`    start a run and relay its SSE stream
//! - `GET  /`                landing page
//! - `GET  /logs`            scrubbed live log stream (opt-in)

pub mod auth;
pub mod error;
pub mod proxy;

pub use auth::{AuthenticatedUser, SessionAuthenticator, TOKEN_COOKIE};
pub use error::ApiError;

use axum::extract::State;
use axum::middleware;
use axum::response::sse::{Event, Sse};
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use futures_util::stream::{self, BoxStream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use relay_core::{subscribe_logs, LogEvent, RelayConfig, RelayError, Result};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_stream::wrappers::BroadcastStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Settings of the relay server
#[derive(Debug, Clone)]
pub struct RelayServerConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the ADK server all routes forward to
    pub adk_base_url: String,
    /// Accepted plain tokens; empty means guest mode
    pub auth_tokens: Vec<String>,
    pub logs_enabled: bool,
}

impl Default for RelayServerConfig {
    fn default() -> Self {
        RelayServerConfig::from(&RelayConfig::default())
    }
}

impl From<&RelayConfig> for RelayServerConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            adk_base_url: config.adk_base_url.clone(),
            auth_tokens: config.auth_tokens.clone(),
            logs_enabled: config.logs_enabled,
        }
    }
}

/// State shared by every route
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RelayServerConfig>,
    pub client: reqwest::Client,
    pub auth: Arc<SessionAuthenticator>,
}

impl AppState {
    pub fn new(config: RelayServerConfig) -> Self {
        let auth = SessionAuthenticator::new(&config.auth_tokens);
        Self {
            config: Arc::new(config),
            client: reqwest::Client::new(),
            auth: Arc::new(auth),
        }
    }
}

/// Build the relay router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/adk/session", post(proxy::create_session))
        .route("/api/adk/chat", post(proxy::chat))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_user,
        ));

    let mut router = Router::new()
        .route("/", get(index))
        .route("/api/adk/health", get(proxy::health))
        .merge(protected);
    if state.config.logs_enabled {
        router = router.route("/logs", get(logs_sse));
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// The relay server service
pub struct RelayServer {
    config: RelayServerConfig,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    local_addr: Option<SocketAddr>,
}

impl RelayServer {
    pub fn new(config: RelayServerConfig) -> Self {
        Self {
            config,
            shutdown_tx: None,
            local_addr: None,
        }
    }

    pub fn router(&self) -> Router {
        router(AppState::new(self.config.clone()))
    }

    /// Address actually bound, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Bind and serve in the background
    pub async fn start(&mut self) -> Result<SocketAddr> {
        if self.is_running() {
            return Err(RelayError::config("Server already running"));
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| RelayError::config(format!("Failed to bind to {}: {}", addr, e)))?;
        let local_addr = listener.local_addr()?;

        if self.config.auth_tokens.is_empty() {
            info!("No auth tokens configured; accepting guest requests");
        }
        info!(
            "Relay listening on http://{} (ADK at {})",
            local_addr, self.config.adk_base_url
        );

        let router = self.router();
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                error!("Server error: {}", e);
            }
        });

        self.shutdown_tx = Some(tx);
        self.local_addr = Some(local_addr);
        Ok(local_addr)
    }

    /// Request graceful shutdown
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!("Relay server stopped");
        }
        self.local_addr = None;
        Ok(())
    }
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let template = r#"<!doctype html><html><head><meta charset='utf-8'><title>Relay</title>
<style>body{font-family:system-ui,sans-serif;max-width:40rem;margin:3rem auto;color:#1e293b}code{background:#f1f5f9;padding:0 .25rem;border-radius:4px}li{margin:.25rem 0}</style>
</head><body>
<h1>ADK Research Assistant relay</h1>
<p>Forwarding to <code>{BASE_URL}</code>. {AUTH_NOTE}</p>
<ul>
<li><code>GET /api/adk/health</code> backend health</li>
<li><code>POST /api/adk/session</code> create a session</li>
<li><code>POST /api/adk/chat</code> run a message, streamed as SSE</li>
{LOGS_ITEM}
</ul>
<p>Chat from a terminal with <code>run-relay-ui chat</code>.</p>
</body></html>"#;

    let auth_note = if state.auth.is_guest_mode() {
        "Guest mode: no token required."
    } else {
        "Send a bearer token or the <code>relay_token</code> cookie."
    };
    let logs_item = if state.config.logs_enabled {
        "<li><code>GET /logs</code> live log stream</li>"
    } else {
        ""
    };

    Html(
        template
            .replace("{BASE_URL}", &escape_html(&state.config.adk_base_url))
            .replace("{AUTH_NOTE}", auth_note)
            .replace("{LOGS_ITEM}", logs_item),
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

static SCRUB_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"sk-[A-Za-z0-9]{20,}", "sk-REDACTED"),
        (
            r"(?i)api[_-]?key\s*[:=]?\s*[A-Za-z0-9-_]{12,}",
            "api_key=REDACTED",
        ),
        (r"(?i)bearer\s+[A-Za-z0-9._~+/=-]{8,}", "Bearer REDACTED"),
        (
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            "email@redacted",
        ),
        (r"\b\+?\d[\d\s-]{8,}\b", "PHONE_REDACTED"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Truncate and redact secrets before a log line leaves the process
fn scrub_message(mut s: String) -> String {
    if s.len() > 2000 {
        s = s.chars().take(2000).collect();
    }
    for (re, rep) in SCRUB_PATTERNS.iter() {
        s = re.replace_all(&s, *rep).into_owned();
    }
    s
}

fn log_event_to_sse(mut ev: LogEvent) -> std::result::Result<Event, Infallible> {
    ev.message = scrub_message(ev.message);
    let data = serde_json::to_string(&ev).unwrap_or_else(|_| "{}".to_string());
    Ok(Event::default().data(data))
}

async fn logs_sse() -> Sse<BoxStream<'static, std::result::Result<Event, Infallible>>> {
    let stream = match subscribe_logs() {
        Some(rx) => BroadcastStream::new(rx)
            .filter_map(|item| async move { item.ok().map(log_event_to_sse) })
            .boxed(),
        None => stream::once(async {
            log_event_to_sse(LogEvent {
                level: "INFO".into(),
                target: "init".into(),
                message: "logging not initialized".into(),
                file: None,
                line: None,
                time: chrono::Utc::now().to_rfc3339(),
            })
        })
        .boxed(),
    };
    Sse::new(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scrub_message() {
        let out = scrub_message(
            "key sk-abcdefghijklmnopqrstuvwx mail bob@example.com auth Bearer abcdef123456".into(),
        );
        assert!(out.contains("sk-REDACTED"));
        assert!(out.contains("email@redacted"));
        assert!(out.contains("Bearer REDACTED"));
        assert!(!out.contains("bob@example.com"));
    }

    #[test]
    fn test_scrub_truncates() {
        let out = scrub_message("x".repeat(5000));
        assert_eq!(out.len(), 2000);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("<a href=\"x\">&"), "&lt;a href=&quot;x&quot;&gt;&amp;");
    }

    #[test]
    fn test_server_config_from_relay_config() {
        let relay = RelayConfig {
            port: 4100,
            auth_tokens: vec!["t".into()],
            ..Default::default()
        };
        let config = RelayServerConfig::from(&relay);
        assert_eq!(config.port, 4100);
        assert_eq!(config.auth_tokens, vec!["t".to_string()]);
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let mut server = RelayServer::new(RelayServerConfig {
            port: 0,
            ..Default::default()
        });
        let addr = server.start().await.unwrap();
        assert_ne!(addr.port(), 0);
        assert!(server.is_running());
        assert!(server.start().await.is_err());
        server.stop().await.unwrap();
        assert!(!server.is_running());
    }
}
