//! The three ADK proxy routes
//!
//! Each handler makes exactly one outbound call and never retries; the
//! client owns retry policy.

use crate::error::ApiError;
use crate::AppState;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use relay_core::{NewMessage, RelayError, RunRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info};
use url::Url;

/// Fixed application and user the session route creates sessions under
const SESSION_APP: &str = "app";
const SESSION_USER: &str = "u_999";

/// Join path segments onto the upstream base URL, percent-encoding each one
pub(crate) fn upstream_url(base: &str, segments: &[&str]) -> relay_core::Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| RelayError::config(format!("Invalid ADK base URL '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| RelayError::config(format!("ADK base URL '{}' cannot have a path", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// `GET /api/adk/health`
///
/// Probes `/list-apps`. Always answers with JSON; 503 when the upstream is
/// unreachable or unhappy.
pub async fn health(State(state): State<AppState>) -> Response {
    let url = match upstream_url(&state.config.adk_base_url, &["list-apps"]) {
        Ok(url) => url,
        Err(e) => return unhealthy("ADK backend is not accessible", e.to_string()),
    };
    debug!("Checking ADK backend health at: {}", url);

    let resp = match state.client.get(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            error!("ADK health check failed: {}", e);
            return unhealthy("ADK backend is not accessible", e.to_string());
        }
    };

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        error!("ADK health check failed with status {}: {}", status, text);
        return unhealthy(
            &format!(
                "ADK backend is not responding properly ({})",
                status.as_u16()
            ),
            text,
        );
    }

    let mut body = json!({
        "status": "healthy",
        "message": "ADK backend is running",
    });
    match resp.json::<Value>().await {
        Ok(apps) => {
            debug!("ADK health check successful, available apps: {}", apps);
            body["apps"] = apps;
        }
        Err(_) => debug!("ADK health check successful (non-JSON response)"),
    }
    Json(body).into_response()
}

fn unhealthy(message: &str, error: String) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "status": "unhealthy",
            "message": message,
            "error": error,
        })),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    #[serde(rename = "sessionId", default)]
    session_id: Option<String>,
}

/// `POST /api/adk/session`
pub async fn create_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let session_id = serde_json::from_slice::<SessionBody>(&body)
        .ok()
        .and_then(|b| b.session_id)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("sessionId is required".to_string()))?;

    let url = upstream_url(
        &state.config.adk_base_url,
        &["apps", SESSION_APP, "users", SESSION_USER, "sessions", &session_id],
    )?;

    let resp = state
        .client
        .post(url)
        .json(&json!({}))
        .send()
        .await
        .map_err(RelayError::from)?;

    let status = resp.status();
    if !status.is_success() {
        return Err(RelayError::upstream(format!(
            "Failed to create ADK session: {}",
            status
        ))
        .into());
    }

    let data: Value = resp.json().await.map_err(RelayError::from)?;
    info!("ADK session created: {}", session_id);
    Ok(Json(normalize_session(&data)))
}

/// Re-emit only the session fields clients rely on, defaulting the collections
fn normalize_session(data: &Value) -> Value {
    let or_default = |key: &str, default: Value| match data.get(key) {
        Some(v) if !v.is_null() => v.clone(),
        _ => default,
    };
    json!({
        "id": data.get("id").cloned().unwrap_or(Value::Null),
        "userId": data.get("userId").cloned().unwrap_or(Value::Null),
        "appName": data.get("appName").cloned().unwrap_or(Value::Null),
        "events": or_default("events", json!([])),
        "state": or_default("state", json!({})),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    #[serde(default)]
    app_name: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    new_message: Option<NewMessage>,
    #[serde(default)]
    streaming: Option<bool>,
}

impl ChatBody {
    fn into_run_request(self) -> Result<RunRequest, ApiError> {
        let required = |field: Option<String>, name: &str| {
            field
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ApiError::BadRequest(format!("{} is required", name)))
        };
        Ok(RunRequest {
            app_name: required(self.app_name, "appName")?,
            user_id: required(self.user_id, "userId")?,
            session_id: required(self.session_id, "sessionId")?,
            new_message: self
                .new_message
                .ok_or_else(|| ApiError::BadRequest("newMessage is required".to_string()))?,
            streaming: self.streaming.unwrap_or(false),
        })
    }
}

/// `POST /api/adk/chat`
///
/// Forwards the run request to `/run_sse` and relays the upstream bytes
/// unmodified as an event stream.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let request = serde_json::from_slice::<ChatBody>(&body)
        .map_err(|e| ApiError::BadRequest(format!("Invalid chat request: {}", e)))?
        .into_run_request()?;

    let url = upstream_url(&state.config.adk_base_url, &["run_sse"])?;
    debug!(
        "Forwarding run for session {} (app {})",
        request.session_id, request.app_name
    );

    let resp = state
        .client
        .post(url)
        .json(&request)
        .send()
        .await
        .map_err(RelayError::from)?;

    let status = resp.status();
    if !status.is_success() {
        return Err(RelayError::upstream(format!("ADK server error: {}", status)).into());
    }

    let mut out = Response::new(Body::from_stream(resp.bytes_stream()));
    let headers = out.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_url_encodes_segment() {
        let url = upstream_url(
            "http://localhost:8000",
            &["apps", "app", "users", "u_999", "sessions", "a b/c?d"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/apps/app/users/u_999/sessions/a%20b%2Fc%3Fd"
        );
    }

    #[test]
    fn test_upstream_url_keeps_base_path() {
        let url = upstream_url("http://host/adk/", &["run_sse"]).unwrap();
        assert_eq!(url.as_str(), "http://host/adk/run_sse");
        assert!(upstream_url("not a url", &["x"]).is_err());
    }

    #[test]
    fn test_normalize_session_defaults() {
        let out = normalize_session(&json!({
            "id": "s1", "userId": "u_999", "appName": "app", "events": null, "extra": 1
        }));
        assert_eq!(
            out,
            json!({"id": "s1", "userId": "u_999", "appName": "app", "events": [], "state": {}})
        );
    }

    #[test]
    fn test_chat_body_validation() {
        let body: ChatBody = serde_json::from_value(json!({
            "appName": "app", "userId": "u", "sessionId": "",
            "newMessage": {"parts": [{"text": "hi"}], "role": "user"}
        }))
        .unwrap();
        assert!(matches!(body.into_run_request(), Err(ApiError::BadRequest(_))));

        let body: ChatBody = serde_json::from_value(json!({
            "appName": "app", "userId": "u", "sessionId": "s",
            "newMessage": {"parts": [{"text": "hi"}], "role": "user"}
        }))
        .unwrap();
        let req = body.into_run_request().unwrap();
        assert!(!req.streaming);
    }
}
